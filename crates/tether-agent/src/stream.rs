use serde_json::Value;

/// Events emitted while the backend generates a response.
///
/// One arm per wire tag; unrecognized kinds flow through as [`Other`]
/// instead of aborting the stream.
///
/// [`Other`]: StreamEvent::Other
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The model started an internal reasoning pass. Diagnostic only.
    ReasoningStart,
    /// Incremental internal reasoning content. Diagnostic only.
    ReasoningDelta { text: String },
    /// Incremental user-visible text.
    TextDelta { text: String },
    /// Final rendering of a generated image.
    Image { url: String },
    /// Intermediate rendering of an image still being generated.
    ImageThumbnail { url: String },
    /// The model invoked a backend-side function.
    ToolCall,
    /// Backend-reported failure; the raw payload is surfaced to the user.
    Error { payload: String },
    /// Unrecognized event kind, preserved for diagnostics.
    Other { kind: String, payload: Value },
}

/// Parse a single SSE line (`event: <type>` or `data: <json>`).
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

/// Decode one `data:` payload into a [`StreamEvent`].
///
/// Error events keep the raw payload verbatim; a payload that is not valid
/// JSON becomes an [`StreamEvent::Error`] so the consumer can surface it.
pub fn parse_event(data: &str) -> StreamEvent {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => {
            return StreamEvent::Error {
                payload: data.to_string(),
            }
        }
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let known = match kind.as_str() {
        "reasoning-start" => Some(StreamEvent::ReasoningStart),
        "reasoning-delta" => {
            str_field(&value, "text").map(|text| StreamEvent::ReasoningDelta { text })
        }
        "text-delta" => str_field(&value, "text").map(|text| StreamEvent::TextDelta { text }),
        "image" => str_field(&value, "url").map(|url| StreamEvent::Image { url }),
        "image-thumbnail" => {
            str_field(&value, "url").map(|url| StreamEvent::ImageThumbnail { url })
        }
        "tool-call" => Some(StreamEvent::ToolCall),
        "error" => Some(StreamEvent::Error {
            payload: data.to_string(),
        }),
        _ => None,
    };

    known.unwrap_or(StreamEvent::Other {
        kind,
        payload: value,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
