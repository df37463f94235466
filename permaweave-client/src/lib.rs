//! Permaweave Client Library
//!
//! Everything between a byte buffer and a durable receipt on the weave:
//! - Transaction assembly and signing ([`transaction`])
//! - The resumable chunk upload session ([`session`])
//! - Network and signing capability traits with bundled implementations
//!   ([`network`], [`signer`])
//! - The pipeline orchestrator ([`pipeline`])

pub mod error;
pub mod network;
pub mod pipeline;
pub mod session;
pub mod signer;
pub mod transaction;

pub use error::{Result, UploadError};
pub use network::{
    ChunkAck, ChunkError, ChunkUpload, GatewayConfig, HttpGateway, MemoryGateway, Network,
    TxStatus,
};
pub use pipeline::{UploadOptions, Uploader};
pub use session::{ProgressEvent, Receipt, RetryPolicy, SessionState, UploadSession};
pub use signer::{Ed25519Signer, Signature, Signer, SignerError};
pub use transaction::{Tag, Transaction, TransactionBuilder, TransactionId};
