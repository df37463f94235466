//! Error types for Permaweave core operations.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Unified error type for the pure pipeline stages
#[derive(Error, Debug)]
pub enum CoreError {
    // ===== Cipher Errors =====
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid counter length: expected {expected}, got {actual}")]
    InvalidCounterLength { expected: usize, actual: usize },

    // ===== Chunk Planning Errors =====
    #[error("Chunk size too large: {size} bytes (max: {max})")]
    ChunkSizeTooLarge { size: u32, max: u32 },

    #[error("Chunk size must be non-zero")]
    ZeroChunkSize,

    #[error("Chunk index out of range: {index} (max: {max})")]
    ChunkIndexOutOfRange { index: u32, max: u32 },
}
