//! One conversation turn, end to end: ingest attachments, rebuild reply
//! context, compose the submission, render the response stream.

use futures_util::future::try_join_all;
use serenity::builder::GetMessages;
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tether_agent::{ContentPart, FileRef, SendMode, TurnRequest};

use crate::error::DiscordError;
use crate::registry::Session;
use crate::render::Renderer;
use crate::reply_context::{self, RemoteFile, WindowMessage};
use crate::surface::ChatSurface;

/// Everything a queued turn needs, captured at arrival time.
#[derive(Debug, Clone)]
pub struct InboundTurn {
    pub author_id: u64,
    pub author_name: String,
    pub author_tag: String,
    /// Message text with the bot's mention token already stripped.
    pub text: String,
    pub attachments: Vec<RemoteFile>,
    pub reply_target: Option<ReplyTarget>,
}

/// The referenced message a reply turn points at.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    pub message_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
}

/// Per-turn settings derived from config.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub reply_window: u8,
    pub max_attachment_bytes: u64,
    pub model_label: String,
}

/// Run one turn against the session's backend thread.
///
/// `http` is only touched when the turn replies to an earlier message (to
/// fetch the history window around it).
pub async fn run_turn<S: ChatSurface>(
    session: &Session,
    surface: &S,
    http: &Http,
    channel_id: ChannelId,
    turn: InboundTurn,
    settings: &TurnSettings,
) -> Result<(), DiscordError> {
    surface.typing().await;

    // Own attachments upload concurrently, order preserved.
    let thread = session.thread.as_ref();
    let mut files: Vec<FileRef> = try_join_all(
        turn.attachments
            .iter()
            .cloned()
            .map(|f| reply_context::ingest(thread, f, settings.max_attachment_bytes)),
    )
    .await?;

    // Quoted context, unless the reply points at the bot itself.
    let mut context_text = String::new();
    if let Some(target) = turn.reply_target.as_ref().filter(|t| !t.author_is_bot) {
        match fetch_window(http, channel_id, target.message_id, settings.reply_window).await {
            Ok(window) => {
                if let Some(block) = reply_context::build_context(
                    thread,
                    window,
                    target.author_id,
                    settings.max_attachment_bytes,
                )
                .await?
                {
                    context_text = block.text;
                    files.extend(block.files);
                }
            }
            // Degrade gracefully: the turn proceeds without quoted context.
            Err(e) => warn!(error = %e, "history fetch failed, skipping reply context"),
        }
    }

    // Compose the submission text.
    let mut input = String::new();
    if let Some(seed) = session.take_seeded_context().await {
        input.push_str(&seed);
        input.push_str("\n\n");
    }
    input.push_str(&context_text);
    input.push_str(&format!(
        "[from: {} (@{}, {})]\n",
        turn.author_name, turn.author_tag, turn.author_id
    ));
    input.push_str(&turn.text);

    let mut contents = vec![ContentPart::Text { text: input }];
    contents.extend(
        files
            .into_iter()
            .map(|f| ContentPart::File { file_id: f.id }),
    );
    let request = TurnRequest {
        mode: SendMode::UserInput,
        contents,
    };

    info!(parts = request.contents.len(), "submitting turn");

    // Submission and consumption run concurrently; the bounded channel
    // backpressures the producer when the platform is slow.
    let (tx, mut rx) = mpsc::channel(64);
    let mut renderer = Renderer::new(surface, &settings.model_label);
    let (submitted, consumed) = tokio::join!(
        session.thread.stream_turn(request, tx),
        renderer.consume(&mut rx),
    );
    consumed?;
    submitted?;

    renderer.finish().await
}

async fn fetch_window(
    http: &Http,
    channel_id: ChannelId,
    around: u64,
    limit: u8,
) -> Result<Vec<WindowMessage>, serenity::Error> {
    let messages = channel_id
        .messages(
            http,
            GetMessages::new().around(MessageId::new(around)).limit(limit),
        )
        .await?;
    Ok(messages.iter().map(reply_context::window_message).collect())
}
