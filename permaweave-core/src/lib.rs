//! Permaweave Core Library
//!
//! Pure building blocks for the encrypted chunked upload pipeline.
//! This crate provides:
//! - AES-256-CTR stream encryption with an explicit counter base
//! - Deterministic chunk planning over a byte buffer
//! - Common constants and error handling
//!
//! Nothing in this crate performs I/O; signing and network submission
//! live in `permaweave-client`.

pub mod chunk;
pub mod cipher;
pub mod error;

pub use chunk::{ChunkPlan, ChunkSpec};
pub use cipher::{decrypt, encrypt, Ciphertext, CounterBase, EncryptionKey};
pub use error::{CoreError, Result};

/// AES-256 key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// AES block / counter size (16 bytes)
pub const COUNTER_SIZE: usize = 16;

/// Chunk size constants
///
/// 256 KiB matches the reference network's fixed chunk size; the planner
/// accepts anything up to `MAX_CHUNK_SIZE`.
pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024; // 256 KiB
pub const MAX_CHUNK_SIZE: u32 = 4 * 1024 * 1024; // 4 MiB
