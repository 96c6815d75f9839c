//! Relaybot: a Telegram bot that relays conversations to an OpenAI-compatible completion API.

pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod messaging;

pub use error::{Error, Result};

/// Platform user identifier.
pub type UserId = i64;

/// Platform message identifier, used to delete transient notices.
pub type MessageId = i32;

/// Inbound event from the messaging platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub chat_id: i64,
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub content: MessageContent,
}

/// Message content variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    /// A `/command` message. `name` has the leading slash and any `@botname` suffix stripped.
    Command { name: String, args: String },
    /// An inline keyboard button was pressed.
    Callback { callback_id: String, data: String },
    /// Stickers, photos and anything else without text.
    Unsupported,
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageContent::Text(text) => write!(f, "{}", text),
            MessageContent::Command { name, args } if args.is_empty() => write!(f, "/{}", name),
            MessageContent::Command { name, args } => write!(f, "/{} {}", name, args),
            MessageContent::Callback { data, .. } => write!(f, "[callback: {}]", data),
            MessageContent::Unsupported => write!(f, "[unsupported]"),
        }
    }
}

/// How outbound text should be parsed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Html,
    Plain,
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard; each inner vec is one row of button labels.
    Menu(Vec<Vec<String>>),
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<InlineButton>>),
}

/// A single inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineButton {
    Callback { label: String, data: String },
    Url { label: String, url: String },
}

/// Outbound response to the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundResponse {
    Text {
        text: String,
        format: TextFormat,
        keyboard: Option<Keyboard>,
        disable_link_preview: bool,
    },
    /// Delete a message previously sent into the same chat.
    Delete { message_id: MessageId },
    /// Acknowledge a callback query, optionally as a modal alert.
    CallbackAnswer { text: String, show_alert: bool },
}

impl OutboundResponse {
    /// Plain text with no keyboard.
    pub fn plain(text: impl Into<String>) -> Self {
        OutboundResponse::Text {
            text: text.into(),
            format: TextFormat::Plain,
            keyboard: None,
            disable_link_preview: false,
        }
    }

    /// HTML text with no keyboard.
    pub fn html(text: impl Into<String>) -> Self {
        OutboundResponse::Text {
            text: text.into(),
            format: TextFormat::Html,
            keyboard: None,
            disable_link_preview: false,
        }
    }

    /// Attach a keyboard. No-op for non-text responses.
    pub fn with_keyboard(mut self, markup: Keyboard) -> Self {
        if let OutboundResponse::Text { keyboard, .. } = &mut self {
            *keyboard = Some(markup);
        }
        self
    }

    /// Disable link previews. No-op for non-text responses.
    pub fn without_link_preview(mut self) -> Self {
        if let OutboundResponse::Text {
            disable_link_preview,
            ..
        } = &mut self
        {
            *disable_link_preview = true;
        }
        self
    }
}
