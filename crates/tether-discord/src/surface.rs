//! Seam over the platform's send/reply/edit/typing operations.
//!
//! The renderer and turn pipeline talk to [`ChatSurface`] only, so they can
//! be exercised against in-memory mocks. [`DiscordSurface`] is the
//! production implementation over serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateMessage, EditMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};

use crate::error::DiscordError;

/// Handle to a platform message that can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle(pub u64);

/// Outbound operations one turn needs from the platform.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Send `text` as a reply to the triggering message.
    async fn reply(&self, text: &str) -> Result<MessageHandle, DiscordError>;

    /// Send `text` as a plain channel message.
    async fn send(&self, text: &str) -> Result<MessageHandle, DiscordError>;

    /// Replace the content of an earlier message.
    async fn edit(&self, message: MessageHandle, text: &str) -> Result<(), DiscordError>;

    /// Re-signal the typing indicator. Best-effort.
    async fn typing(&self);
}

/// Production surface bound to one channel and one triggering message.
pub struct DiscordSurface {
    http: Arc<Http>,
    channel_id: ChannelId,
    reply_to: MessageId,
}

impl DiscordSurface {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, reply_to: MessageId) -> Self {
        Self {
            http,
            channel_id,
            reply_to,
        }
    }
}

#[async_trait]
impl ChatSurface for DiscordSurface {
    async fn reply(&self, text: &str) -> Result<MessageHandle, DiscordError> {
        let message = self
            .channel_id
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(text)
                    .reference_message((self.channel_id, self.reply_to)),
            )
            .await?;
        Ok(MessageHandle(message.id.get()))
    }

    async fn send(&self, text: &str) -> Result<MessageHandle, DiscordError> {
        let message = self.channel_id.say(&self.http, text).await?;
        Ok(MessageHandle(message.id.get()))
    }

    async fn edit(&self, message: MessageHandle, text: &str) -> Result<(), DiscordError> {
        self.channel_id
            .edit_message(
                &self.http,
                MessageId::new(message.0),
                EditMessage::new().content(text),
            )
            .await?;
        Ok(())
    }

    async fn typing(&self) {
        let _ = self.channel_id.broadcast_typing(&self.http).await;
    }
}
