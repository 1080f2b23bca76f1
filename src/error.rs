//! Library error type.
//!
//! Pipeline operations return [`Error`]; the CLI wraps it in `anyhow` and the
//! HTTP server maps each variant to a status code (see [`crate::server`]).

use crate::extract::ExtractError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported file format: {0}")]
    UnsupportedFileFormat(String),
    #[error("text extraction failed: {0}")]
    Extraction(String),
    #[error("chat completion returned {status}: {body}")]
    UpstreamHttp { status: u16, body: String },
    #[error("chat completion request failed: {0}")]
    Transport(String),
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("No action items found for this meeting")]
    NoActionItems,
    #[error("invalid edit state: {0}")]
    InvalidState(String),
}

impl From<ExtractError> for Error {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(name) => Self::UnsupportedFileFormat(name),
            other => Self::Extraction(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
