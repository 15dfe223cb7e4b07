pub mod error;
pub mod http;
pub mod sse;
pub mod stream;
pub mod thread;

pub use error::BackendError;
pub use http::HttpThreadService;
pub use stream::StreamEvent;
pub use thread::{
    AiThread, ContentPart, FilePayload, FileRef, SendMode, ThreadService, TurnRequest,
};
