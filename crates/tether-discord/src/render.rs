//! Stream consumer and output renderer.
//!
//! Drives one turn's event stream into platform messages. Text deltas
//! accumulate and flush as chunked sends; image events maintain a transient
//! placeholder message that thumbnails refine in place until the final image
//! detaches it. All state here is turn-scoped.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use tether_agent::StreamEvent;
use tether_core::config::TYPING_REFRESH_EVENTS;

use crate::error::DiscordError;
use crate::send::send_text;
use crate::surface::{ChatSurface, MessageHandle};

pub struct Renderer<'a, S: ChatSurface> {
    surface: &'a S,
    model_label: &'a str,
    text: String,
    first: bool,
    placeholder: Option<MessageHandle>,
    events: usize,
}

impl<'a, S: ChatSurface> Renderer<'a, S> {
    pub fn new(surface: &'a S, model_label: &'a str) -> Self {
        Self {
            surface,
            model_label,
            text: String::new(),
            first: true,
            placeholder: None,
            events: 0,
        }
    }

    /// Drain the event stream. Returns once the producer closes the channel.
    pub async fn consume(
        &mut self,
        rx: &mut mpsc::Receiver<StreamEvent>,
    ) -> Result<(), DiscordError> {
        while let Some(event) = rx.recv().await {
            self.events += 1;
            // Liveness heartbeat: long generations keep the indicator alive.
            if self.events % TYPING_REFRESH_EVENTS == 0 {
                self.surface.typing().await;
            }
            self.on_event(event).await?;
        }
        Ok(())
    }

    /// Flush whatever text remains, with the model attribution footer.
    pub async fn finish(mut self) -> Result<(), DiscordError> {
        self.text.push_str("\n-# model: ");
        self.text.push_str(self.model_label);
        self.flush_text().await
    }

    async fn on_event(&mut self, event: StreamEvent) -> Result<(), DiscordError> {
        match event {
            StreamEvent::ReasoningStart => debug!("reasoning started"),
            StreamEvent::ReasoningDelta { text } => debug!(len = text.len(), "reasoning delta"),
            StreamEvent::TextDelta { text } => self.text.push_str(&text),
            StreamEvent::ImageThumbnail { url } => self.on_image(url, false).await?,
            StreamEvent::Image { url } => self.on_image(url, true).await?,
            StreamEvent::ToolCall => {
                self.surface.typing().await;
                self.emit("-# function call...").await?;
            }
            StreamEvent::Error { payload } => {
                warn!(%payload, "backend error event");
                self.emit(&format!("⚠️ backend error:\n```\n{payload}\n```"))
                    .await?;
            }
            StreamEvent::Other { kind, payload } => {
                debug!(%kind, %payload, "unhandled stream event");
            }
        }
        Ok(())
    }

    /// Flush accumulated text, then create or refine the image placeholder.
    /// The final (non-thumbnail) image detaches the placeholder so a later
    /// image starts a new one.
    async fn on_image(&mut self, url: String, is_final: bool) -> Result<(), DiscordError> {
        self.surface.typing().await;
        self.flush_text().await?;

        match self.placeholder {
            Some(message) => self.surface.edit(message, &url).await?,
            None => self.placeholder = send_text(self.surface, &url, &mut self.first).await?,
        }
        if is_final {
            self.placeholder = None;
        }
        Ok(())
    }

    async fn flush_text(&mut self) -> Result<(), DiscordError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.text);
        send_text(self.surface, &text, &mut self.first).await?;
        Ok(())
    }

    /// Send a standalone notice without touching accumulated text.
    async fn emit(&mut self, text: &str) -> Result<(), DiscordError> {
        send_text(self.surface, text, &mut self.first).await?;
        Ok(())
    }
}
