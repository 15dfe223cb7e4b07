use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use tether_core::TetherConfig;

#[derive(Parser)]
#[command(name = "tether", about = "Bridge Discord channels to a streaming AI backend")]
struct Args {
    /// Config file path (default: TETHER_CONFIG env, then ~/.tether/tether.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=info".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("TETHER_CONFIG").ok());
    let mut config = TetherConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        TetherConfig::default()
    });

    // The platform token may arrive out-of-band via the environment.
    if config.discord.bot_token.is_empty() {
        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            config.discord.bot_token = token;
        }
    }
    if config.discord.bot_token.is_empty() {
        anyhow::bail!("no Discord bot token: set discord.bot_token or DISCORD_TOKEN");
    }

    let service = Arc::new(tether_agent::HttpThreadService::new(
        config.backend.base_url.clone(),
        config.backend.api_key.clone(),
    ));
    let registry = Arc::new(tether_discord::ChatRegistry::new(
        service,
        config.discord.system_context.clone(),
    ));

    info!(backend = %config.backend.base_url, model = %config.backend.model_label, "tether starting");

    let adapter = tether_discord::DiscordAdapter::new(
        &config.discord,
        registry,
        config.backend.model_label.clone(),
    );
    adapter.run().await;

    Ok(())
}
