use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use tether_core::config::DiscordConfig;

use crate::handler::Handler;
use crate::registry::ChatRegistry;
use crate::turn::TurnSettings;

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits, reconnecting whenever the gateway drops.
pub struct DiscordAdapter {
    registry: Arc<ChatRegistry>,
    config: DiscordConfig,
    settings: TurnSettings,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, registry: Arc<ChatRegistry>, model_label: String) -> Self {
        let settings = TurnSettings {
            reply_window: config.reply_window,
            max_attachment_bytes: config.max_attachment_bytes,
            model_label,
        };
        Self {
            registry,
            config: config.clone(),
            settings,
        }
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MEMBERS;

        let mut client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: initial connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: reconnect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = Handler {
            registry: Arc::clone(&self.registry),
            settings: self.settings.clone(),
            bot_id: OnceLock::new(),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
