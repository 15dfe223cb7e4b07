//! Outbound text path: markdown normalization, chunking, first-reply routing.

use once_cell::sync::Lazy;
use regex::Regex;

use tether_core::config::MESSAGE_CHUNK_MAX;

use crate::error::DiscordError;
use crate::segment::segment;
use crate::surface::{ChatSurface, MessageHandle};

/// Discord renders at most three heading levels.
static DEEP_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^####+ ").unwrap());

/// Wrap link targets in `<...>` so Discord does not unfurl them.
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^\s>)]+)\)").unwrap());

pub fn normalize_markdown(text: &str) -> String {
    let text = DEEP_HEADING.replace_all(text, "### ");
    MD_LINK.replace_all(&text, "[$1](<$2>)").into_owned()
}

/// Send `text` as one or more platform messages.
///
/// The very first emission of a turn is a reply to the triggering message;
/// everything after it is a plain channel send. `first` is cleared on first
/// use. Returns the handle of the last message sent, if any.
pub async fn send_text<S: ChatSurface + ?Sized>(
    surface: &S,
    text: &str,
    first: &mut bool,
) -> Result<Option<MessageHandle>, DiscordError> {
    let mut last = None;
    for part in segment(&normalize_markdown(text), MESSAGE_CHUNK_MAX) {
        let handle = if *first {
            *first = false;
            surface.reply(&part).await?
        } else {
            surface.send(&part).await?
        };
        last = Some(handle);
    }
    Ok(last)
}
