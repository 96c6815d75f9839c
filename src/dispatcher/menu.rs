//! Keyboards, menu buttons and fixed user-facing texts.

use crate::conversation::SnippetCache;
use crate::{InlineButton, Keyboard, OutboundResponse};

use teloxide::utils::html;

pub const PROCESSING_TEXT: &str = "⏳ Processing your request...";
pub const ERROR_TEXT: &str =
    "⚠️ Something went wrong while processing your request. Please try again later.";
pub const SUBSCRIBE_TEXT: &str = "📢 Subscribe to our channel to use the bot:";
pub const SUBSCRIBE_BUTTON: &str = "Subscribe";
pub const COPY_BUTTON: &str = "📋 Copy code";
pub const COPY_FOUND_TEXT: &str = "Code copied to the clipboard!\n\nPaste it with Ctrl+V";
pub const COPY_NOT_FOUND_TEXT: &str = "Code not found";
pub const COPY_FAILED_TEXT: &str = "Copy failed";

/// Buttons of the main reply keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    Ask,
    Support,
    Advertise,
    About,
    Cancel,
}

impl MenuButton {
    pub const ALL: [MenuButton; 5] = [
        MenuButton::Ask,
        MenuButton::Support,
        MenuButton::Advertise,
        MenuButton::About,
        MenuButton::Cancel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuButton::Ask => "💬 Ask a question",
            MenuButton::Support => "💰 Support",
            MenuButton::Advertise => "📢 Advertise",
            MenuButton::About => "ℹ️ About",
            MenuButton::Cancel => "🚫 Cancel",
        }
    }

    /// Match an incoming text against the button labels exactly.
    pub fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|button| button.label() == text)
    }
}

/// Two-by-two main menu.
pub fn main_keyboard() -> Keyboard {
    Keyboard::Menu(vec![
        vec![
            MenuButton::Ask.label().to_string(),
            MenuButton::Support.label().to_string(),
        ],
        vec![
            MenuButton::Advertise.label().to_string(),
            MenuButton::About.label().to_string(),
        ],
    ])
}

pub fn cancel_keyboard() -> Keyboard {
    Keyboard::Menu(vec![vec![MenuButton::Cancel.label().to_string()]])
}

/// Inline button pointing at a cached snippet.
pub fn copy_keyboard(snippet_id: u64) -> Keyboard {
    Keyboard::Inline(vec![vec![InlineButton::Callback {
        label: COPY_BUTTON.to_string(),
        data: SnippetCache::callback_data(snippet_id),
    }]])
}

/// Public link for a channel: `@name` becomes a t.me link, URLs pass through.
pub fn channel_link(channel: &str) -> Option<String> {
    if let Some(name) = channel.strip_prefix('@') {
        return Some(format!("https://t.me/{name}"));
    }
    if channel.starts_with("https://") || channel.starts_with("http://") {
        return Some(channel.to_string());
    }
    None
}

pub fn subscribe_prompt(channel: &str) -> OutboundResponse {
    let prompt = OutboundResponse::plain(SUBSCRIBE_TEXT);
    match channel_link(channel) {
        Some(url) => prompt.with_keyboard(Keyboard::Inline(vec![vec![InlineButton::Url {
            label: SUBSCRIBE_BUTTON.to_string(),
            url,
        }]])),
        None => prompt,
    }
}

pub fn welcome(model: &str, key_count: usize) -> OutboundResponse {
    OutboundResponse::html(format!(
        "🤖 <b>Welcome to the AI bot</b> (model: {})\n\nAPI keys available: {key_count}\nChoose an action:",
        html::escape(model)
    ))
    .with_keyboard(main_keyboard())
}

/// Canned reply for a menu button. None of these reach the completion provider.
pub fn menu_reply(button: MenuButton, donate_link: &str, project_info: &str) -> OutboundResponse {
    match button {
        MenuButton::Support => OutboundResponse::html(format!(
            "❤️ <b>Support the project:</b>\n{donate_link}"
        ))
        .without_link_preview()
        .with_keyboard(main_keyboard()),
        MenuButton::About => OutboundResponse::html(project_info).with_keyboard(main_keyboard()),
        MenuButton::Advertise => OutboundResponse::plain("✉️ Send the text of your advertisement:")
            .with_keyboard(cancel_keyboard()),
        MenuButton::Ask => {
            OutboundResponse::plain("📝 Enter your question:").with_keyboard(cancel_keyboard())
        }
        MenuButton::Cancel => {
            OutboundResponse::plain("Action cancelled").with_keyboard(main_keyboard())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for button in MenuButton::ALL {
            assert_eq!(MenuButton::from_label(button.label()), Some(button));
        }
        assert_eq!(MenuButton::from_label("Support"), None);
    }

    #[test]
    fn channel_links() {
        assert_eq!(channel_link("@news").as_deref(), Some("https://t.me/news"));
        assert_eq!(
            channel_link("https://t.me/+invite").as_deref(),
            Some("https://t.me/+invite")
        );
        assert_eq!(channel_link("-1001234"), None);
    }

    #[test]
    fn welcome_escapes_model_name() {
        let OutboundResponse::Text { text, .. } = welcome("a<b>", 2) else {
            panic!("welcome should be text");
        };
        assert!(text.contains("(model: a&lt;b&gt;)"));
        assert!(text.contains("API keys available: 2"));
    }
}
