//! Error types for the upload pipeline.

use crate::network::ChunkError;
use permaweave_core::CoreError;
use thiserror::Error;

/// Result type alias for upload operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Caller-visible upload failures
///
/// Permanent preconditions (missing key, empty payload, signing rejection)
/// fail before any network call is made.
#[derive(Error, Debug)]
pub enum UploadError {
    // ===== Precondition Errors =====
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Encryption requested but no key was supplied")]
    MissingKey,

    #[error("Payload is empty and empty payloads are disabled")]
    EmptyData,

    #[error("Signing failed: {0}")]
    Signing(String),

    // ===== Submission Errors =====
    #[error("Chunk submission failed: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Retry budget exhausted at chunk {chunk_index}: {last_error}")]
    RetryExhausted {
        chunk_index: u32,
        last_error: ChunkError,
    },

    #[error("Network unavailable")]
    NetworkUnavailable,

    // ===== Session Errors =====
    #[error("Invalid session state: expected {expected}, was {actual}")]
    InvalidSessionState {
        expected: &'static str,
        actual: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_display() {
        let err = UploadError::RetryExhausted {
            chunk_index: 7,
            last_error: ChunkError::Transient("503 from gateway".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Retry budget exhausted at chunk 7: transient chunk error: 503 from gateway"
        );
    }
}
