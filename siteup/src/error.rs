//! Error handling.

use displaydoc::Display;

pub type SiteupResult<T> = Result<T, SiteupError>;

/// An error.
#[derive(Debug, Display)]
pub enum SiteupError {
    /// Invalid chunk size {size}: chunks must hold at least one character.
    InvalidChunkSize { size: usize },

    /// Document splits into {count} chunks, more than a single upload can carry.
    TooManyChunks { count: usize },

    /// Upload ID must not be empty.
    EmptyUploadId,

    /// Failed to serialize document: {0}
    SerializeError(serde_json::Error),
}

impl std::error::Error for SiteupError {}

impl From<serde_json::Error> for SiteupError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializeError(error)
    }
}
