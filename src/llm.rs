//! Completion provider clients, key pool and retry logic.

pub mod client;
pub mod manager;
pub mod pool;

pub use client::{Completion, CompletionClient, CompletionRequest, OpenAiClient};
pub use manager::LlmManager;
pub use pool::KeyPool;
