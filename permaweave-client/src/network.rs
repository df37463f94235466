//! Network capability
//!
//! The storage network is an opaque content-addressed ledger with a
//! chunk-submission API. The pipeline only depends on the [`Network`]
//! trait; two implementations are provided: an HTTP gateway client and
//! an in-memory gateway for tests and offline runs.
//!
//! Chunk submission is idempotent per (transaction, index): resubmitting
//! an already-accepted chunk acks again without side effects.

use crate::transaction::{Transaction, TransactionId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use permaweave_core::ChunkSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Chunk-level submission errors
///
/// Transient errors feed the session's retry loop; permanent errors fail
/// the session immediately.
#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    #[error("transient chunk error: {0}")]
    Transient(String),

    #[error("permanent chunk error: {0}")]
    Permanent(String),

    #[error("network unavailable")]
    Unavailable,
}

/// Acknowledgement for an accepted chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAck {
    pub index: u32,
}

/// Out-of-band transaction status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TxStatus {
    Pending,
    Accepted { confirmations: u64 },
    NotFound,
}

/// One chunk ready for submission
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub index: u32,
    pub offset: u64,
    pub data: Bytes,
}

impl ChunkUpload {
    /// Slice a chunk payload out of a transaction according to the plan
    pub fn from_spec(spec: &ChunkSpec, data: &Bytes) -> Self {
        Self {
            index: spec.index,
            offset: spec.offset,
            data: spec.slice(data),
        }
    }
}

/// Remote storage network capability
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Post the signed envelope; must precede chunk submission
    async fn submit_header(&self, tx: &Transaction) -> Result<(), ChunkError>;

    /// Submit one chunk; idempotent per chunk index
    async fn submit_chunk(
        &self,
        id: &TransactionId,
        chunk: ChunkUpload,
    ) -> Result<ChunkAck, ChunkError>;

    /// Query transaction status (out-of-band confirmation)
    async fn status(&self, id: &TransactionId) -> Result<TxStatus, ChunkError>;
}

/// Gateway connection settings
///
/// The single shared network-client instance of older clients becomes an
/// explicitly passed configuration object owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1984,
            protocol: "http".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Base URL for HTTP requests
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Serialize)]
struct HeaderBody<'a> {
    id: &'a str,
    data_size: u64,
    data_root: String,
    tags: Vec<TagBody<'a>>,
    signature: String,
}

#[derive(Serialize)]
struct TagBody<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct ChunkBody<'a> {
    tx_id: &'a str,
    index: u32,
    offset: u64,
    data: String,
}

/// HTTP gateway implementation over reqwest
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway client from connection settings
    pub fn new(config: &GatewayConfig) -> Result<Self, ChunkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChunkError::Permanent(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    fn map_send_error(e: reqwest::Error) -> ChunkError {
        if e.is_connect() {
            ChunkError::Unavailable
        } else {
            // Timeouts count as failed attempts, not session aborts
            ChunkError::Transient(e.to_string())
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChunkError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(ChunkError::Transient(format!("gateway returned {}", status)))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ChunkError::Permanent(format!("{}: {}", status, message)))
        }
    }
}

#[async_trait::async_trait]
impl Network for HttpGateway {
    async fn submit_header(&self, tx: &Transaction) -> Result<(), ChunkError> {
        let body = HeaderBody {
            id: tx.id.as_str(),
            data_size: tx.data_size(),
            data_root: STANDARD.encode(tx.data_root),
            tags: tx
                .tags
                .iter()
                .map(|t| TagBody {
                    name: &t.name,
                    value: &t.value,
                })
                .collect(),
            signature: STANDARD.encode(tx.signature.as_bytes()),
        };

        let response = self
            .client
            .post(format!("{}/tx", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check(response).await?;
        Ok(())
    }

    async fn submit_chunk(
        &self,
        id: &TransactionId,
        chunk: ChunkUpload,
    ) -> Result<ChunkAck, ChunkError> {
        let body = ChunkBody {
            tx_id: id.as_str(),
            index: chunk.index,
            offset: chunk.offset,
            data: STANDARD.encode(&chunk.data),
        };

        let response = self
            .client
            .post(format!("{}/chunk", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::check(response).await?;
        Ok(ChunkAck { index: chunk.index })
    }

    async fn status(&self, id: &TransactionId) -> Result<TxStatus, ChunkError> {
        let response = self
            .client
            .get(format!("{}/tx/{}/status", self.base_url, id))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if response.status().as_u16() == 404 {
            return Ok(TxStatus::NotFound);
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ChunkError::Permanent(e.to_string()))
    }
}

/// In-memory gateway for tests and offline runs
///
/// Accepts every submission and remembers acked chunk indices per
/// transaction, so re-submission is observably idempotent.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    headers: HashMap<String, u64>,
    chunks: HashMap<String, BTreeSet<u32>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acked chunk indices for a transaction
    pub fn acked_chunks(&self, id: &TransactionId) -> BTreeSet<u32> {
        self.inner
            .lock()
            .unwrap()
            .chunks
            .get(id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the header for a transaction has been posted
    pub fn has_header(&self, id: &TransactionId) -> bool {
        self.inner.lock().unwrap().headers.contains_key(id.as_str())
    }

    /// True if nothing has ever been submitted
    pub fn is_empty(&self) -> bool {
        let state = self.inner.lock().unwrap();
        state.headers.is_empty() && state.chunks.is_empty()
    }
}

#[async_trait::async_trait]
impl Network for MemoryGateway {
    async fn submit_header(&self, tx: &Transaction) -> Result<(), ChunkError> {
        let mut state = self.inner.lock().unwrap();
        state
            .headers
            .insert(tx.id.as_str().to_string(), tx.data_size());
        Ok(())
    }

    async fn submit_chunk(
        &self,
        id: &TransactionId,
        chunk: ChunkUpload,
    ) -> Result<ChunkAck, ChunkError> {
        let mut state = self.inner.lock().unwrap();
        if !state.headers.contains_key(id.as_str()) {
            return Err(ChunkError::Permanent(format!(
                "unknown transaction {}",
                id
            )));
        }
        state
            .chunks
            .entry(id.as_str().to_string())
            .or_default()
            .insert(chunk.index);
        Ok(ChunkAck { index: chunk.index })
    }

    async fn status(&self, id: &TransactionId) -> Result<TxStatus, ChunkError> {
        let state = self.inner.lock().unwrap();
        match state.headers.get(id.as_str()) {
            None => Ok(TxStatus::NotFound),
            Some(_) => {
                let acked = state
                    .chunks
                    .get(id.as_str())
                    .map(|s| s.len())
                    .unwrap_or(0);
                if acked > 0 {
                    Ok(TxStatus::Accepted {
                        confirmations: acked as u64,
                    })
                } else {
                    Ok(TxStatus::Pending)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use crate::transaction::TransactionBuilder;

    async fn test_transaction() -> Transaction {
        let signer = Ed25519Signer::generate();
        TransactionBuilder::new()
            .build(Bytes::from_static(b"chunk data"), "text/plain", false, &signer)
            .await
            .unwrap()
    }

    #[test]
    fn test_gateway_config_base_url() {
        let config = GatewayConfig {
            host: "weave.example.net".to_string(),
            port: 443,
            protocol: "https".to_string(),
        };
        assert_eq!(config.base_url(), "https://weave.example.net:443");
    }

    #[tokio::test]
    async fn test_memory_gateway_idempotent_resubmission() {
        let gateway = MemoryGateway::new();
        let tx = test_transaction().await;
        gateway.submit_header(&tx).await.unwrap();

        let chunk = ChunkUpload {
            index: 0,
            offset: 0,
            data: tx.data.clone(),
        };

        let first = gateway.submit_chunk(&tx.id, chunk.clone()).await.unwrap();
        let second = gateway.submit_chunk(&tx.id, chunk).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.acked_chunks(&tx.id).len(), 1);
    }

    #[tokio::test]
    async fn test_memory_gateway_requires_header() {
        let gateway = MemoryGateway::new();
        let tx = test_transaction().await;

        let chunk = ChunkUpload {
            index: 0,
            offset: 0,
            data: tx.data.clone(),
        };
        let result = gateway.submit_chunk(&tx.id, chunk).await;
        assert!(matches!(result, Err(ChunkError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_memory_gateway_status() {
        let gateway = MemoryGateway::new();
        let tx = test_transaction().await;

        assert_eq!(
            gateway.status(&tx.id).await.unwrap(),
            TxStatus::NotFound
        );

        gateway.submit_header(&tx).await.unwrap();
        assert_eq!(gateway.status(&tx.id).await.unwrap(), TxStatus::Pending);

        let chunk = ChunkUpload {
            index: 0,
            offset: 0,
            data: tx.data.clone(),
        };
        gateway.submit_chunk(&tx.id, chunk).await.unwrap();
        assert_eq!(
            gateway.status(&tx.id).await.unwrap(),
            TxStatus::Accepted { confirmations: 1 }
        );
    }
}
