//! Pipeline orchestrator
//!
//! Composes the pipeline: cipher → chunk plan → transaction build →
//! upload session. One upload runs per call; the orchestrator never
//! retries a whole file after a failure — the caller decides between
//! [`Uploader::resume`] and abandoning the session.

use crate::error::{Result, UploadError};
use crate::network::Network;
use crate::session::{ProgressEvent, Receipt, RetryPolicy, UploadSession};
use crate::signer::Signer;
use crate::transaction::TransactionBuilder;
use bytes::Bytes;
use permaweave_core::{cipher, ChunkPlan, CounterBase, EncryptionKey, DEFAULT_CHUNK_SIZE};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Per-upload options
pub struct UploadOptions {
    /// Encrypt the payload before chunking
    pub encrypt: bool,
    /// Key for encryption; required when `encrypt` is set, consumed by
    /// the upload and never persisted
    pub key: Option<EncryptionKey>,
    /// Chunk size for the plan
    pub chunk_size: u32,
    /// Permit zero-length payloads
    pub allow_empty_payload: bool,
    /// Retry policy for transient chunk failures
    pub retry: RetryPolicy,
    /// Additional tags beyond `Content-Type` and `Encrypted`
    pub extra_tags: Vec<(String, String)>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            encrypt: false,
            key: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            allow_empty_payload: false,
            retry: RetryPolicy::default(),
            extra_tags: Vec::new(),
        }
    }
}

/// Drives single-file uploads end to end
///
/// Owns the network and signer capabilities plus one progress channel
/// shared across its uploads.
pub struct Uploader {
    network: Arc<dyn Network>,
    signer: Arc<dyn Signer>,
    progress: broadcast::Sender<ProgressEvent>,
}

impl Uploader {
    pub fn new(network: Arc<dyn Network>, signer: Arc<dyn Signer>) -> Self {
        let (progress, _) = broadcast::channel(256);
        Self {
            network,
            signer,
            progress,
        }
    }

    /// Subscribe to progress events for uploads driven by this uploader
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Prepare a session: cipher, chunk plan, signed transaction
    ///
    /// All precondition failures (missing key, empty payload, signing
    /// rejection) surface here, before any network call.
    pub async fn prepare(
        &self,
        file_bytes: Bytes,
        mime_type: &str,
        options: UploadOptions,
    ) -> Result<UploadSession> {
        let (payload, counter_base) = if options.encrypt {
            let key = options.key.as_ref().ok_or(UploadError::MissingKey)?;
            let counter_base = CounterBase::generate();
            let ciphertext = cipher::encrypt(&file_bytes, key, counter_base);
            debug!(len = ciphertext.len(), "payload encrypted");
            (ciphertext.bytes, Some(counter_base))
        } else {
            (file_bytes, None)
        };

        let plan = ChunkPlan::plan(payload.len() as u64, options.chunk_size)?;

        let mut builder =
            TransactionBuilder::new().allow_empty_payload(options.allow_empty_payload);
        for (name, value) in &options.extra_tags {
            builder = builder.with_tag(name.clone(), value.clone());
        }
        let transaction = builder
            .build(payload, mime_type, options.encrypt, self.signer.as_ref())
            .await?;

        info!(
            tx = %transaction.id,
            chunks = plan.len(),
            encrypted = options.encrypt,
            "transaction signed"
        );

        Ok(UploadSession::new(
            transaction,
            plan,
            counter_base,
            options.retry,
            self.progress.clone(),
        ))
    }

    /// Upload a file buffer to completion
    ///
    /// On failure the session is lost with the error; callers that want
    /// to resume should use [`prepare`](Self::prepare) and keep the
    /// session across the [`UploadSession::run`] call themselves.
    pub async fn upload(
        &self,
        file_bytes: Bytes,
        mime_type: &str,
        options: UploadOptions,
    ) -> Result<Receipt> {
        let mut session = self.prepare(file_bytes, mime_type, options).await?;
        session.run(self.network.as_ref()).await
    }

    /// Resume a failed session, submitting only the missing chunks
    pub async fn resume(&self, session: &mut UploadSession) -> Result<Receipt> {
        session.resume(self.network.as_ref()).await
    }
}
