//! Messaging trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{InboundMessage, MessageId, OutboundResponse, UserId};
use futures::Stream;
use std::pin::Pin;

/// Message stream type.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Static trait for messaging adapters.
/// Use this for type-safe implementations.
pub trait Messaging: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Start the adapter and return inbound message stream.
    fn start(&self) -> impl std::future::Future<Output = Result<InboundStream>> + Send;

    /// Send a response into the chat `message` came from.
    ///
    /// Returns the id of the sent message when the response created one.
    fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> impl std::future::Future<Output = Result<Option<MessageId>>> + Send;

    /// Whether `user_id` belongs to `channel`.
    fn is_member(
        &self,
        channel: &str,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Graceful shutdown.
    fn shutdown(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn MessagingDyn>` for storing different adapters.
pub trait MessagingDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn start<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InboundStream>> + Send + 'a>>;

    fn respond<'a>(
        &'a self,
        message: &'a InboundMessage,
        response: OutboundResponse,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Option<MessageId>>> + Send + 'a>>;

    fn is_member<'a>(
        &'a self,
        channel: &'a str,
        user_id: UserId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bool>> + Send + 'a>>;

    fn shutdown<'a>(&'a self)
    -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing Messaging automatically implements MessagingDyn.
impl<T: Messaging> MessagingDyn for T {
    fn name(&self) -> &str {
        Messaging::name(self)
    }

    fn start<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<InboundStream>> + Send + 'a>> {
        Box::pin(Messaging::start(self))
    }

    fn respond<'a>(
        &'a self,
        message: &'a InboundMessage,
        response: OutboundResponse,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Option<MessageId>>> + Send + 'a>> {
        Box::pin(Messaging::respond(self, message, response))
    }

    fn is_member<'a>(
        &'a self,
        channel: &'a str,
        user_id: UserId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(Messaging::is_member(self, channel, user_id))
    }

    fn shutdown<'a>(
        &'a self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Messaging::shutdown(self))
    }
}
