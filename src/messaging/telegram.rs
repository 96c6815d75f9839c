//! Telegram messaging adapter using teloxide long polling.

use crate::error::{MessagingError, Result};
use crate::messaging::traits::{InboundStream, Messaging};
use crate::{
    InlineButton, InboundMessage, Keyboard, MessageContent, MessageId, OutboundResponse,
    TextFormat, UserId,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use teloxide::dispatching::{Dispatcher, ShutdownToken, UpdateFilterExt};
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    LinkPreviewOptions, ParseMode, Recipient, ReplyMarkup, Update,
};
use tokio::sync::{Mutex, RwLock, mpsc};

const PLATFORM: &str = "telegram";

/// Telegram adapter state.
pub struct TelegramAdapter {
    bot: Bot,
    callbacks: PendingCallbacks,
    shutdown_token: Arc<RwLock<Option<ShutdownToken>>>,
}

/// Callback queries waiting for an answer, keyed by the id handed to the dispatcher.
///
/// The query itself is kept so the answer goes out with teloxide's own id type.
#[derive(Clone, Default)]
struct PendingCallbacks {
    next_id: Arc<AtomicU64>,
    queries: Arc<Mutex<HashMap<String, CallbackQuery>>>,
}

impl PendingCallbacks {
    async fn register(&self, query: CallbackQuery) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.queries.lock().await.insert(id.clone(), query);
        id
    }

    async fn take(&self, id: &str) -> Option<CallbackQuery> {
        self.queries.lock().await.remove(id)
    }
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token.into()),
            callbacks: PendingCallbacks::default(),
            shutdown_token: Arc::new(RwLock::new(None)),
        }
    }
}

impl Messaging for TelegramAdapter {
    fn name(&self) -> &str {
        PLATFORM
    }

    async fn start(&self) -> Result<InboundStream> {
        let me = self.bot.get_me().await.map_err(request_error)?;
        tracing::info!(
            username = me.user.username.as_deref().unwrap_or("unknown"),
            bot_id = me.user.id.0,
            "telegram connected"
        );

        let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(256);

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(forward_message))
            .branch(Update::filter_callback_query().endpoint(forward_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![inbound_tx, self.callbacks.clone()])
            .default_handler(|update| async move {
                tracing::trace!(?update, "unhandled telegram update");
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "error in telegram update handler",
            ))
            .build();

        *self.shutdown_token.write().await = Some(dispatcher.shutdown_token());

        tokio::spawn(async move {
            dispatcher.dispatch().await;
            tracing::info!("telegram dispatcher stopped");
        });

        let stream = tokio_stream::wrappers::ReceiverStream::new(inbound_rx);
        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> Result<Option<MessageId>> {
        let chat_id = ChatId(message.chat_id);

        match response {
            OutboundResponse::Text {
                text,
                format,
                keyboard,
                disable_link_preview,
            } => {
                let mut request = self.bot.send_message(chat_id, text);
                if format == TextFormat::Html {
                    request = request.parse_mode(ParseMode::Html);
                }
                if disable_link_preview {
                    request = request.link_preview_options(LinkPreviewOptions {
                        is_disabled: true,
                        url: None,
                        prefer_small_media: false,
                        prefer_large_media: false,
                        show_above_text: false,
                    });
                }
                if let Some(keyboard) = keyboard {
                    request = request.reply_markup(build_markup(keyboard)?);
                }
                let sent = request.await.map_err(request_error)?;
                Ok(Some(sent.id.0))
            }
            OutboundResponse::Delete { message_id } => {
                self.bot
                    .delete_message(chat_id, teloxide::types::MessageId(message_id))
                    .await
                    .map_err(request_error)?;
                Ok(None)
            }
            OutboundResponse::CallbackAnswer { text, show_alert } => {
                let MessageContent::Callback { callback_id, .. } = &message.content else {
                    return Err(MessagingError::InvalidTarget(
                        "callback answer for a message that is not a callback".into(),
                    )
                    .into());
                };
                let query = self.callbacks.take(callback_id).await.ok_or_else(|| {
                    MessagingError::InvalidTarget(format!("unknown callback {callback_id}"))
                })?;

                let mut request = self.bot.answer_callback_query(query.id);
                if !text.is_empty() {
                    request = request.text(text);
                }
                request
                    .show_alert(show_alert)
                    .await
                    .map_err(request_error)?;
                Ok(None)
            }
        }
    }

    async fn is_member(&self, channel: &str, user_id: UserId) -> Result<bool> {
        let recipient = parse_recipient(channel)?;
        let user_id = u64::try_from(user_id)
            .map_err(|_| MessagingError::InvalidTarget(format!("user {user_id}")))?;

        let member = self
            .bot
            .get_chat_member(recipient, teloxide::types::UserId(user_id))
            .await
            .map_err(request_error)?;

        Ok(member.kind.is_owner() || member.kind.is_administrator() || member.kind.is_member())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(token) = self.shutdown_token.read().await.as_ref() {
            match token.shutdown() {
                Ok(stopped) => stopped.await,
                Err(error) => tracing::debug!(%error, "telegram dispatcher was not running"),
            }
        }

        tracing::info!("telegram adapter shut down");
        Ok(())
    }
}

async fn forward_message(
    msg: Message,
    inbound_tx: mpsc::Sender<InboundMessage>,
) -> ResponseResult<()> {
    // Channel posts and service messages have no sender
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    let content = match msg.text() {
        Some(text) => parse_text(text),
        None => MessageContent::Unsupported,
    };

    let inbound = InboundMessage {
        id: msg.id.0,
        chat_id: msg.chat.id.0,
        sender_id: from.id.0 as i64,
        sender_name: Some(from.full_name()),
        content,
    };

    if let Err(error) = inbound_tx.send(inbound).await {
        tracing::warn!(
            %error,
            "failed to send inbound message from Telegram (receiver dropped)"
        );
    }
    Ok(())
}

async fn forward_callback(
    query: CallbackQuery,
    inbound_tx: mpsc::Sender<InboundMessage>,
    callbacks: PendingCallbacks,
) -> ResponseResult<()> {
    let sender_id = query.from.id.0 as i64;
    let sender_name = query.from.full_name();
    let chat_id = query
        .message
        .as_ref()
        .map(|message| message.chat().id.0)
        .unwrap_or(sender_id);
    let id = query
        .message
        .as_ref()
        .map(|message| message.id().0)
        .unwrap_or_default();
    let data = query.data.clone().unwrap_or_default();

    let callback_id = callbacks.register(query).await;

    let inbound = InboundMessage {
        id,
        chat_id,
        sender_id,
        sender_name: Some(sender_name),
        content: MessageContent::Callback {
            callback_id: callback_id.clone(),
            data,
        },
    };

    if let Err(error) = inbound_tx.send(inbound).await {
        callbacks.take(&callback_id).await;
        tracing::warn!(
            %error,
            "failed to send callback query from Telegram (receiver dropped)"
        );
    }
    Ok(())
}

/// Split `/command@bot args` into a command, anything else is plain text.
fn parse_text(text: &str) -> MessageContent {
    if let Some(rest) = text.strip_prefix('/') {
        let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let name = head.split('@').next().unwrap_or(head);
        if !name.is_empty() {
            return MessageContent::Command {
                name: name.to_lowercase(),
                args: args.trim().to_string(),
            };
        }
    }
    MessageContent::Text(text.to_string())
}

/// `@username` or a numeric chat id.
fn parse_recipient(channel: &str) -> Result<Recipient> {
    if channel.starts_with('@') {
        return Ok(Recipient::ChannelUsername(channel.to_string()));
    }
    channel
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| MessagingError::InvalidTarget(format!("channel {channel:?}")).into())
}

fn build_markup(keyboard: Keyboard) -> Result<ReplyMarkup> {
    match keyboard {
        Keyboard::Menu(rows) => {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
            Ok(KeyboardMarkup::new(rows).resize_keyboard().into())
        }
        Keyboard::Inline(rows) => {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(inline_button).collect::<Result<Vec<_>>>())
                .collect::<Result<Vec<_>>>()?;
            Ok(InlineKeyboardMarkup::new(rows).into())
        }
    }
}

fn inline_button(button: InlineButton) -> Result<InlineKeyboardButton> {
    match button {
        InlineButton::Callback { label, data } => Ok(InlineKeyboardButton::callback(label, data)),
        InlineButton::Url { label, url } => {
            let parsed = reqwest::Url::parse(&url)
                .map_err(|_| MessagingError::InvalidTarget(format!("url {url:?}")))?;
            Ok(InlineKeyboardButton::url(label, parsed))
        }
    }
}

fn request_error(error: teloxide::RequestError) -> crate::Error {
    MessagingError::Request {
        platform: PLATFORM.into(),
        message: error.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix_and_args() {
        assert_eq!(
            parse_text("/start"),
            MessageContent::Command {
                name: "start".into(),
                args: String::new(),
            }
        );
        assert_eq!(
            parse_text("/Start@relay_bot  ref123 "),
            MessageContent::Command {
                name: "start".into(),
                args: "ref123".into(),
            }
        );
    }

    #[test]
    fn plain_text_and_lone_slash_stay_text() {
        assert_eq!(parse_text("hello"), MessageContent::Text("hello".into()));
        assert_eq!(parse_text("/"), MessageContent::Text("/".into()));
        assert_eq!(parse_text("/ spaced"), MessageContent::Text("/ spaced".into()));
    }

    #[test]
    fn recipients_accept_usernames_and_numeric_ids() {
        assert!(matches!(
            parse_recipient("@news").expect("username"),
            Recipient::ChannelUsername(name) if name == "@news"
        ));
        assert!(matches!(
            parse_recipient("-1001234").expect("numeric id"),
            Recipient::Id(ChatId(-1001234))
        ));
        assert!(parse_recipient("not a channel").is_err());
    }

    #[test]
    fn invalid_button_url_is_rejected() {
        let error = build_markup(Keyboard::Inline(vec![vec![InlineButton::Url {
            label: "Join".into(),
            url: "not a url".into(),
        }]]))
        .expect_err("bad url must fail");
        assert!(error.to_string().contains("not a url"));
    }
}
