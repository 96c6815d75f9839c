//! Per-user dialog state and reply rendering.

pub mod format;
pub mod history;
pub mod snippets;

pub use format::{FormattedReply, extract_code, format_response};
pub use history::{DialogHistory, DialogTurn, Role};
pub use snippets::SnippetCache;
