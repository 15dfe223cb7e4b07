//! Reply-context reconstruction.
//!
//! When a turn replies to an earlier message, a bounded window of history
//! around that message is quoted back to the model: only the referenced
//! author's messages are kept (gaps allowed, so interleaved replies do not
//! truncate the context), ordered oldest → newest. Attachments and embed
//! images found in the window are ingested as backend uploads while the
//! quote is built, and ride along as turn input files.

use serde_json::{json, Value};
use serenity::model::channel::{Embed, Message};
use tracing::debug;

use tether_agent::{AiThread, FilePayload, FileRef};

use crate::error::DiscordError;

/// A remote file discovered on a message (attachment or embed image).
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub url: String,
    pub name: String,
    pub is_image: bool,
}

/// Platform-agnostic view of one message inside the fetched window.
#[derive(Debug, Clone)]
pub struct WindowMessage {
    pub id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub author_tag: String,
    pub content: String,
    pub embeds: Vec<Value>,
    pub files: Vec<RemoteFile>,
}

/// Quoted transcript plus the files ingested while building it.
pub struct ContextBlock {
    pub text: String,
    pub files: Vec<FileRef>,
}

/// Build the quoted context block for a reply turn.
///
/// Returns `None` when no message in `window` is from `target_author`.
pub async fn build_context(
    thread: &dyn AiThread,
    mut window: Vec<WindowMessage>,
    target_author: u64,
    max_file_bytes: u64,
) -> Result<Option<ContextBlock>, DiscordError> {
    window.retain(|m| m.author_id == target_author);
    // Snowflake ids are creation-ordered.
    window.sort_by_key(|m| m.id);

    let Some(head) = window.first() else {
        return Ok(None);
    };

    let mut text = format!(
        "[quoted context from {} (@{}, {})]\n",
        head.author_name, head.author_tag, head.author_id
    );
    let mut pending: Vec<RemoteFile> = Vec::new();

    for message in &window {
        for line in message.content.lines() {
            text.push_str("> ");
            text.push_str(line);
            text.push('\n');
        }
        for embed in &message.embeds {
            text.push_str("> ");
            text.push_str(&embed.to_string());
            text.push('\n');
        }
        pending.extend(message.files.iter().cloned());
    }
    text.push('\n');

    debug!(
        quoted = window.len(),
        files = pending.len(),
        "reply context assembled"
    );

    let uploads = pending.into_iter().map(|f| ingest(thread, f, max_file_bytes));
    let files = futures_util::future::try_join_all(uploads).await?;

    Ok(Some(ContextBlock { text, files }))
}

/// Fetch a remote file and upload it to the backend thread.
pub(crate) async fn ingest(
    thread: &dyn AiThread,
    file: RemoteFile,
    max_bytes: u64,
) -> Result<FileRef, DiscordError> {
    let bytes = reqwest::get(&file.url)
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    if bytes.len() as u64 > max_bytes {
        return Err(DiscordError::AttachmentTooLarge {
            name: file.name,
            size: bytes.len() as u64,
            limit: max_bytes,
        });
    }
    let uploaded = thread
        .upload_file(FilePayload {
            bytes: bytes.to_vec(),
            name: file.name,
            is_image: file.is_image,
        })
        .await?;
    Ok(uploaded)
}

/// Project a serenity message into the window view, collecting attachments
/// and embed images as candidate files.
pub fn window_message(message: &Message) -> WindowMessage {
    let mut files: Vec<RemoteFile> = message
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

    let mut embeds = Vec::new();
    for embed in &message.embeds {
        embeds.push(embed_metadata(embed));
        if let Some(image) = &embed.image {
            files.push(RemoteFile {
                url: image.url.clone(),
                name: file_name_from_url(&image.url, "embed-image"),
                is_image: true,
            });
        }
    }

    WindowMessage {
        id: message.id.get(),
        author_id: message.author.id.get(),
        author_name: message
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| message.author.name.clone()),
        author_tag: message.author.tag(),
        content: message.content.clone(),
        embeds,
        files,
    }
}

/// Compact JSON rendering of an embed, for model visibility.
fn embed_metadata(embed: &Embed) -> Value {
    let mut meta = serde_json::Map::new();
    if let Some(title) = &embed.title {
        meta.insert("title".into(), json!(title));
    }
    if let Some(description) = &embed.description {
        meta.insert("description".into(), json!(description));
    }
    if let Some(url) = &embed.url {
        meta.insert("url".into(), json!(url));
    }
    if let Some(image) = &embed.image {
        meta.insert("image".into(), json!(image.url));
    }
    if !embed.fields.is_empty() {
        let fields: Vec<Value> = embed
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value }))
            .collect();
        meta.insert("fields".into(), Value::Array(fields));
    }
    Value::Object(meta)
}

fn file_name_from_url(url: &str, fallback: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|tail| tail.split('?').next().unwrap_or(tail))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}
