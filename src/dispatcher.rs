//! Message dispatcher: routes inbound events to canned replies or the completion provider.

pub mod menu;

use crate::config::Config;
use crate::conversation::snippets::COPY_CALLBACK_PREFIX;
use crate::conversation::{DialogHistory, Role, SnippetCache, extract_code, format_response};
use crate::error::Result;
use crate::llm::LlmManager;
use crate::messaging::{InboundStream, MessagingDyn};
use crate::{InboundMessage, MessageContent, OutboundResponse, UserId};

use futures::StreamExt as _;
use menu::MenuButton;
use std::sync::Arc;

/// Gate and canned-content settings.
#[derive(Debug, Clone, Default)]
pub struct DispatcherSettings {
    /// Channel users must join. `None` lets everyone in.
    pub channel_id: Option<String>,
    /// Always allowed through the gate.
    pub admin_id: Option<UserId>,
    pub donate_link: String,
    pub project_info: String,
}

impl DispatcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel_id: config.telegram.channel_id.clone(),
            admin_id: config.telegram.admin_id,
            donate_link: config.bot.donate_link.clone(),
            project_info: config.bot.project_info.clone(),
        }
    }
}

/// Owns the per-process stores and handles one inbound event at a time per task.
pub struct MessageDispatcher {
    messaging: Arc<dyn MessagingDyn>,
    llm: Arc<LlmManager>,
    history: DialogHistory,
    snippets: SnippetCache,
    settings: DispatcherSettings,
}

impl MessageDispatcher {
    pub fn new(
        messaging: Arc<dyn MessagingDyn>,
        llm: Arc<LlmManager>,
        history: DialogHistory,
        snippets: SnippetCache,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            messaging,
            llm,
            history,
            snippets,
            settings,
        }
    }

    pub fn history(&self) -> &DialogHistory {
        &self.history
    }

    pub fn snippets(&self) -> &SnippetCache {
        &self.snippets
    }

    /// Consume the inbound stream, handling each event on its own task.
    pub async fn run(self: Arc<Self>, mut inbound: InboundStream) {
        while let Some(message) = inbound.next().await {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.handle(message).await;
            });
        }
        tracing::info!("inbound stream ended");
    }

    /// Handle one inbound event. Never fails; problems are logged and reported to the user.
    #[tracing::instrument(
        skip(self, message),
        fields(
            user_id = message.sender_id,
            chat_id = message.chat_id,
            message_id = message.id,
            sender = message.sender_name.as_deref().unwrap_or("unknown"),
        )
    )]
    pub async fn handle(&self, message: InboundMessage) {
        match &message.content {
            MessageContent::Command { name, .. } if name == "start" => {
                if let Err(error) = self.handle_start(&message).await {
                    tracing::warn!(%error, "failed to answer /start");
                }
            }
            MessageContent::Text(text) => match MenuButton::from_label(text) {
                Some(button) => {
                    let reply = menu::menu_reply(
                        button,
                        &self.settings.donate_link,
                        &self.settings.project_info,
                    );
                    if let Err(error) = self.messaging.respond(&message, reply).await {
                        tracing::warn!(%error, ?button, "failed to answer menu button");
                    }
                }
                None => self.handle_prompt(&message, text).await,
            },
            // Unknown commands go to the model like any other text
            MessageContent::Command { .. } => {
                let text = message.content.to_string();
                self.handle_prompt(&message, &text).await;
            }
            MessageContent::Callback { data, .. } => {
                if let Err(error) = self.handle_callback(&message, data).await {
                    tracing::warn!(%error, "failed to answer callback");
                }
            }
            MessageContent::Unsupported => {
                tracing::debug!("ignoring message without text");
            }
        }
    }

    /// Membership gate. Lookup failures count as "not a member".
    async fn is_member(&self, user_id: UserId) -> bool {
        let Some(channel) = &self.settings.channel_id else {
            return true;
        };
        if self.settings.admin_id == Some(user_id) {
            return true;
        }

        match self.messaging.is_member(channel, user_id).await {
            Ok(is_member) => is_member,
            Err(error) => {
                tracing::error!(user_id, %error, "membership check failed");
                false
            }
        }
    }

    async fn handle_start(&self, message: &InboundMessage) -> Result<()> {
        let reply = if self.is_member(message.sender_id).await {
            menu::welcome(self.llm.model(), self.llm.key_count())
        } else {
            let channel = self.settings.channel_id.as_deref().unwrap_or_default();
            menu::subscribe_prompt(channel)
        };
        self.messaging.respond(message, reply).await?;
        Ok(())
    }

    async fn handle_prompt(&self, message: &InboundMessage, text: &str) {
        let user_id = message.sender_id;
        if !self.is_member(user_id).await {
            tracing::debug!("ignoring message from non-member");
            return;
        }

        let mut notice_id = None;
        let result = async {
            notice_id = self
                .messaging
                .respond(message, OutboundResponse::plain(menu::PROCESSING_TEXT))
                .await?;
            self.relay(message, text).await
        }
        .await;

        if let Err(error) = result {
            tracing::error!(user_id, %error, "failed to process message");
            let notice = OutboundResponse::plain(menu::ERROR_TEXT).with_keyboard(menu::main_keyboard());
            if let Err(error) = self.messaging.respond(message, notice).await {
                tracing::warn!(user_id, %error, "failed to send error notice");
            }
        }

        if let Some(message_id) = notice_id {
            let delete = OutboundResponse::Delete { message_id };
            if let Err(error) = self.messaging.respond(message, delete).await {
                tracing::warn!(user_id, %error, "failed to delete processing notice");
            }
        }
    }

    /// Record the user turn, ask the model, record and send the answer.
    async fn relay(&self, message: &InboundMessage, text: &str) -> Result<()> {
        let user_id = message.sender_id;

        self.history.append(user_id, Role::User, text).await;
        let transcript = self.history.read(user_id).await;

        let answer = self.llm.complete(&transcript).await?;
        let formatted = format_response(&answer);
        self.history.append(user_id, Role::Assistant, answer.as_str()).await;

        let keyboard = extract_code(&answer).map(|code| {
            let snippet_id = self.snippets.store(&code);
            menu::copy_keyboard(snippet_id)
        });

        tracing::debug!(
            turns = transcript.len(),
            answer_len = answer.len(),
            has_code = keyboard.is_some(),
            "sending completion"
        );

        let reply = OutboundResponse::Text {
            text: formatted.text,
            format: formatted.format,
            keyboard,
            disable_link_preview: false,
        };
        self.messaging.respond(message, reply).await?;
        Ok(())
    }

    /// Copy buttons only report whether the snippet still exists.
    async fn handle_callback(&self, message: &InboundMessage, data: &str) -> Result<()> {
        let answer = match data.strip_prefix(COPY_CALLBACK_PREFIX) {
            Some(raw_id) => match raw_id.parse::<u64>() {
                Ok(snippet_id) if self.snippets.lookup(snippet_id).is_some() => {
                    OutboundResponse::CallbackAnswer {
                        text: menu::COPY_FOUND_TEXT.into(),
                        show_alert: true,
                    }
                }
                Ok(snippet_id) => {
                    tracing::debug!(snippet_id, "copy requested for unknown snippet");
                    OutboundResponse::CallbackAnswer {
                        text: menu::COPY_NOT_FOUND_TEXT.into(),
                        show_alert: false,
                    }
                }
                Err(error) => {
                    tracing::warn!(data, %error, "malformed copy callback");
                    OutboundResponse::CallbackAnswer {
                        text: menu::COPY_FAILED_TEXT.into(),
                        show_alert: false,
                    }
                }
            },
            None => OutboundResponse::CallbackAnswer {
                text: String::new(),
                show_alert: false,
            },
        };

        self.messaging.respond(message, answer).await?;
        Ok(())
    }
}
