//! Backend interface — traits at the seam between the conversation
//! orchestrator and the thread-based AI service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::stream::StreamEvent;

/// Submission mode flag for a turn.
#[derive(Debug, Clone, Copy, Serialize)]
pub enum SendMode {
    #[serde(rename = "USER_INPUT")]
    UserInput,
}

/// Backend-side handle for an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
}

/// Binary payload for [`AiThread::upload_file`].
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub name: String,
    pub is_image: bool,
}

/// One typed content part of a turn submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    File { file_id: String },
}

/// A fully composed turn, ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRequest {
    pub mode: SendMode,
    pub contents: Vec<ContentPart>,
}

/// Factory for backend conversation threads.
#[async_trait]
pub trait ThreadService: Send + Sync {
    /// Allocate a fresh thread (including its owning user entity).
    async fn create_thread(&self) -> Result<Arc<dyn AiThread>, BackendError>;
}

/// One backend conversation thread. Created once per session and reused for
/// every turn on that session.
#[async_trait]
pub trait AiThread: Send + Sync {
    async fn upload_file(&self, file: FilePayload) -> Result<FileRef, BackendError>;

    /// Submit a turn and drive the response stream to completion, emitting
    /// events through `tx`. The channel is bounded, so a slow consumer
    /// backpressures the producer. Returns once the stream ends; submission
    /// failures are returned before any event is emitted.
    async fn stream_turn(
        &self,
        req: TurnRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError>;
}
