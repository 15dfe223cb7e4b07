use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Rendering constants — shared by the Discord adapter.
/// Maximum characters per outbound message (Discord caps messages at 2000).
pub const MESSAGE_CHUNK_MAX: usize = 1500;
/// Re-signal the typing indicator every Nth stream event.
pub const TYPING_REFRESH_EVENTS: usize = 7;

/// Top-level config (tether.toml + TETHER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. The DISCORD_TOKEN env var is honored as a fallback.
    #[serde(default)]
    pub bot_token: String,

    /// How many messages to fetch around a replied-to message when
    /// reconstructing quoted context.
    #[serde(default = "default_reply_window")]
    pub reply_window: u8,

    /// Attachments larger than this are rejected before upload.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Optional system context injected into each session's first turn.
    #[serde(default)]
    pub system_context: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            reply_window: default_reply_window(),
            max_attachment_bytes: default_max_attachment_bytes(),
            system_context: None,
        }
    }
}

/// Connection settings for the thread-based AI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Label rendered in the model attribution footer of every response.
    #[serde(default = "default_model_label")]
    pub model_label: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model_label: default_model_label(),
        }
    }
}

impl TetherConfig {
    /// Load config from `config_path` (or `~/.tether/tether.toml`), then
    /// apply `TETHER_`-prefixed env overrides (`__` separates nesting,
    /// e.g. `TETHER_DISCORD__BOT_TOKEN`).
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TETHER_").split("__"))
            .extract()
            .map_err(|e| crate::error::ConfigError::Invalid(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tether/tether.toml", home)
}

fn default_reply_window() -> u8 {
    10
}

fn default_max_attachment_bytes() -> u64 {
    8 * 1024 * 1024
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_model_label() -> String {
    "assistant".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: TetherConfig = Figment::new()
            .merge(Toml::string("[discord]\nbot_token = \"abc\""))
            .extract()
            .unwrap();
        assert_eq!(config.discord.bot_token, "abc");
        assert_eq!(config.discord.reply_window, 10);
        assert_eq!(config.backend.model_label, "assistant");
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn empty_config_is_usable() {
        let config = TetherConfig::default();
        assert!(config.discord.bot_token.is_empty());
        assert_eq!(config.discord.max_attachment_bytes, 8 * 1024 * 1024);
    }
}
