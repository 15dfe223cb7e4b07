use tether_agent::BackendError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("attachment fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("attachment '{name}' is {size} bytes (limit {limit})")]
    AttachmentTooLarge { name: String, size: u64, limit: u64 },

    #[error("no bot token configured")]
    NoToken,
}
