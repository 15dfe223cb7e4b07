/// Errors produced by the AI backend client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend rejected request ({status}): {body}")]
    Api { status: u16, body: String },
}
