//! TuxReader Error Types
//!
//! Centralized error handling for the narration pipeline.

use thiserror::Error;

/// Central error type for TuxReader
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("TTS engine error: {0}")]
    Tts(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("voice catalog not yet populated")]
    NotReady,

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TuxReader operations
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for ReaderError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ReaderError::Lock(err.to_string())
    }
}
