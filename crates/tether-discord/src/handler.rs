//! Serenity event handler wired to the conversation registry.

use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{error, info, warn};

use crate::registry::ChatRegistry;
use crate::reply_context::RemoteFile;
use crate::surface::{ChatSurface, DiscordSurface};
use crate::turn::{self, InboundTurn, ReplyTarget, TurnSettings};

pub struct Handler {
    pub registry: Arc<ChatRegistry>,
    pub settings: TurnSettings,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(name = %ready.user.name, "Discord bot connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Conversation turns come only from humans mentioning the bot in a
        // guild channel.
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }
        let Some(&bot_id) = self.bot_id.get() else {
            return;
        };
        if !msg.mentions_user_id(bot_id) {
            return;
        }

        if is_clear_command(&msg.content, bot_id) {
            self.registry.clear(msg.channel_id.get()).await;
            if let Err(e) = msg.reply(&ctx.http, "conversation context cleared.").await {
                warn!(error = %e, "clear acknowledgment failed");
            }
            return;
        }

        let session = match self.registry.get_or_create(msg.channel_id.get()).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, channel_id = %msg.channel_id, "session creation failed");
                let _ = msg
                    .reply(&ctx.http, "⚠️ could not reach the AI backend.")
                    .await;
                return;
            }
        };

        let turn = inbound_turn(&msg, bot_id);
        let surface = DiscordSurface::new(Arc::clone(&ctx.http), msg.channel_id, msg.id);
        let http = Arc::clone(&ctx.http);
        let channel_id = msg.channel_id;
        let message_id = msg.id;
        let settings = self.settings.clone();
        let worker_session = Arc::clone(&session);

        // Turns queue behind everything already in flight on this channel;
        // other channels are unaffected.
        let queued = session.queue.enqueue(async move {
            info!(message_id = %message_id, channel_id = %channel_id, "turn start");
            let result = turn::run_turn(
                &worker_session,
                &surface,
                &http,
                channel_id,
                turn,
                &settings,
            )
            .await;

            if let Err(e) = result {
                error!(message_id = %message_id, error = %e, "turn failed");
                let notice = format!("⚠️ turn failed:\n```\n{e}\n```");
                if let Err(e) = surface.send(&notice).await {
                    warn!(error = %e, "failure notice send failed");
                }
            }
        });
        if !queued {
            warn!(channel_id = %channel_id, "turn queue unavailable");
        }
    }
}

/// Exact-match in-band command: the bot's mention token followed by `clear`.
fn is_clear_command(content: &str, bot_id: UserId) -> bool {
    let content = content.trim();
    content == format!("<@{bot_id}> clear") || content == format!("<@!{bot_id}> clear")
}

/// Remove every form of the bot's own mention token.
fn strip_mentions(content: &str, bot_id: UserId) -> String {
    content
        .replace(&format!("<@{bot_id}>"), "")
        .replace(&format!("<@!{bot_id}>"), "")
        .trim()
        .to_string()
}

fn inbound_turn(msg: &Message, bot_id: UserId) -> InboundTurn {
    let attachments = msg
        .attachments
        .iter()
        .map(|a| RemoteFile {
            url: a.proxy_url.clone(),
            name: a.filename.clone(),
            is_image: a
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("image/")),
        })
        .collect();

    let reply_target = msg.referenced_message.as_deref().map(|r| ReplyTarget {
        message_id: r.id.get(),
        author_id: r.author.id.get(),
        author_is_bot: r.author.bot,
    });

    InboundTurn {
        author_id: msg.author.id.get(),
        author_name: msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone()),
        author_tag: msg.author.tag(),
        text: strip_mentions(&msg.content, bot_id),
        attachments,
        reply_target,
    }
}
