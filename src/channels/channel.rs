//! Chat transport interface.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// A message received from a vendor.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel name the message arrived on.
    pub channel: String,
    /// Conversation identity; one wizard session per sender.
    pub sender: String,
    pub content: String,
    /// Language hint from the transport (e.g. a client locale).
    pub language: Option<String>,
}

impl IncomingMessage {
    pub fn new(channel: &str, sender: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

/// Text to render back to the vendor.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Stream of inbound messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A chat transport the wizard can be driven through.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response to the sender of `msg`.
    async fn respond(&self, msg: &IncomingMessage, response: OutgoingResponse) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
