use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    StatusError { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Stream ended before a final output was produced")]
    IncompleteStream,

    #[error("Missing trace id in item input")]
    MissingTraceId,

    #[error("Trace not found: {0}")]
    TraceNotFound(String),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}
