//! SSE consumption for backend response streams.
//!
//! Reads a reqwest byte stream, reassembles complete lines across chunk
//! boundaries, and emits one [`StreamEvent`] per `data:` payload.

use tokio::sync::mpsc;

use crate::stream::{parse_event, parse_sse_line, SseParsed, StreamEvent};

/// Drive `resp`'s body to completion, sending decoded events into `tx`.
///
/// Transport errors mid-stream are surfaced as a final [`StreamEvent::Error`];
/// the turn is not aborted by them.
pub async fn process_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut buf: Vec<u8> = Vec::new();
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        payload: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        for line in drain_lines(&mut buf, &chunk) {
            if let Some(SseParsed::Data(data)) = parse_sse_line(&line) {
                if data == "[DONE]" {
                    return;
                }
                if tx.send(parse_event(&data)).await.is_err() {
                    return; // receiver dropped
                }
            }
        }
    }
}

/// Append `chunk` to `buf` and drain every complete line.
///
/// Lines are split on `\n` at the byte level, so a multi-byte character
/// straddling a chunk boundary stays intact in the buffer until its line
/// completes. Blank lines (SSE event separators) are dropped.
fn drain_lines(buf: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buf.extend_from_slice(chunk);

    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines
}
