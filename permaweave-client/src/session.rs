//! Upload session state machine
//!
//! A session owns a signed transaction and its chunk plan, submits chunks
//! in increasing index order, tracks acknowledgements, retries transient
//! failures with bounded backoff, and reports progress through a broadcast
//! channel.
//!
//! States: `Signed → Uploading → Complete` on the happy path,
//! `Uploading → Failed` on retry exhaustion, and `Failed → Uploading` on
//! an externally triggered resume. The acked set survives failure, so a
//! resume submits only the missing indices.
//!
//! One chunk submission is in flight at a time. The reference network
//! expects a single linear byte stream; do not parallelize submissions
//! without out-of-order acceptance on the target network.

use crate::error::{Result, UploadError};
use crate::network::{ChunkError, ChunkUpload, Network};
use crate::transaction::{Transaction, TransactionId};
use permaweave_core::{ChunkPlan, CounterBase};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transaction signed, no chunk submitted yet
    Signed,
    /// Chunk submission loop in progress
    Uploading,
    /// All chunks acknowledged; the transaction id is the durable receipt
    Complete,
    /// Retry budget exhausted; resumable
    Failed,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Signed => "Signed",
            SessionState::Uploading => "Uploading",
            SessionState::Complete => "Complete",
            SessionState::Failed => "Failed",
        }
    }
}

/// Progress snapshot emitted after each acknowledged chunk
///
/// `pct_complete` is monotonically non-decreasing across a session and
/// reaches exactly 100.0 only at `Complete`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub pct_complete: f64,
    pub acked_count: usize,
    pub total_count: usize,
}

/// Retry policy for transient chunk failures
///
/// Exponential backoff with jitter, capped at `max_delay`. A chunk whose
/// attempt count reaches `max_attempts` fails the session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (attempt numbering starts at 1)
    fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16))
            .min(self.max_delay);
        // Up to 50% jitter so parallel sessions don't sync up
        let jitter = rand::thread_rng().gen_range(0..=exp.as_millis() as u64 / 2);
        exp + Duration::from_millis(jitter)
    }
}

/// The durable result of a completed upload
///
/// Carries the counter base for encrypted uploads; without it the
/// ciphertext cannot be decrypted later.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub id: TransactionId,
    pub counter_base: Option<CounterBase>,
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Resumable chunk upload session
pub struct UploadSession {
    transaction: Transaction,
    plan: ChunkPlan,
    counter_base: Option<CounterBase>,
    acked: BTreeSet<u32>,
    attempts: HashMap<u32, u32>,
    state: SessionState,
    retry: RetryPolicy,
    header_submitted: bool,
    progress: broadcast::Sender<ProgressEvent>,
}

impl UploadSession {
    /// Create a session for a signed transaction
    ///
    /// Progress events are published on `progress`; subscribe before
    /// calling [`run`](Self::run) to observe every acknowledgement.
    pub fn new(
        transaction: Transaction,
        plan: ChunkPlan,
        counter_base: Option<CounterBase>,
        retry: RetryPolicy,
        progress: broadcast::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            transaction,
            plan,
            counter_base,
            acked: BTreeSet::new(),
            attempts: HashMap::new(),
            state: SessionState::Signed,
            retry,
            header_submitted: false,
            progress,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acknowledged chunk indices
    pub fn acked(&self) -> &BTreeSet<u32> {
        &self.acked
    }

    /// The signed transaction driven by this session
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Run the session from `Signed` to `Complete` or `Failed`
    pub async fn run(&mut self, network: &dyn Network) -> Result<Receipt> {
        if self.state != SessionState::Signed {
            return Err(UploadError::InvalidSessionState {
                expected: "Signed",
                actual: self.state.name(),
            });
        }
        self.drive(network).await
    }

    /// Re-enter `Uploading` after a failure, submitting only missing chunks
    ///
    /// Attempt counters are reset; already-acknowledged chunks are skipped.
    pub async fn resume(&mut self, network: &dyn Network) -> Result<Receipt> {
        match self.state {
            SessionState::Failed | SessionState::Uploading => {
                self.attempts.clear();
                self.drive(network).await
            }
            other => Err(UploadError::InvalidSessionState {
                expected: "Failed or Uploading",
                actual: other.name(),
            }),
        }
    }

    async fn drive(&mut self, network: &dyn Network) -> Result<Receipt> {
        self.state = SessionState::Uploading;
        let total = self.plan.len();

        if !self.header_submitted {
            if let Err(e) = network.submit_header(&self.transaction).await {
                self.state = SessionState::Failed;
                return Err(self.map_chunk_error(e));
            }
            self.header_submitted = true;
            debug!(tx = %self.transaction.id, chunks = total, "transaction header posted");
        }

        while let Some(index) = self.next_missing() {
            self.submit_with_retries(network, index).await?;

            let event = ProgressEvent {
                pct_complete: self.acked.len() as f64 / total as f64 * 100.0,
                acked_count: self.acked.len(),
                total_count: total,
            };
            // No subscriber is fine; events are advisory
            let _ = self.progress.send(event);
        }

        self.state = SessionState::Complete;
        info!(tx = %self.transaction.id, chunks = total, "upload complete");
        Ok(Receipt {
            id: self.transaction.id.clone(),
            counter_base: self.counter_base,
        })
    }

    /// Lowest-indexed chunk not yet acknowledged
    fn next_missing(&self) -> Option<u32> {
        (0..self.plan.len() as u32).find(|i| !self.acked.contains(i))
    }

    async fn submit_with_retries(&mut self, network: &dyn Network, index: u32) -> Result<()> {
        loop {
            let attempt = {
                let counter = self.attempts.entry(index).or_insert(0);
                *counter += 1;
                *counter
            };

            let spec = self.plan.get(index)?;
            let chunk = ChunkUpload::from_spec(spec, &self.transaction.data);

            match network.submit_chunk(&self.transaction.id, chunk).await {
                Ok(ack) => {
                    self.acked.insert(ack.index);
                    return Ok(());
                }
                Err(ChunkError::Transient(reason)) => {
                    if attempt >= self.retry.max_attempts {
                        warn!(
                            tx = %self.transaction.id,
                            chunk = index,
                            attempts = attempt,
                            "retry budget exhausted"
                        );
                        self.state = SessionState::Failed;
                        return Err(UploadError::RetryExhausted {
                            chunk_index: index,
                            last_error: ChunkError::Transient(reason),
                        });
                    }
                    let delay = self.retry.delay(attempt);
                    debug!(
                        tx = %self.transaction.id,
                        chunk = index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason,
                        "transient chunk failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(self.map_chunk_error(e));
                }
            }
        }
    }

    fn map_chunk_error(&self, e: ChunkError) -> UploadError {
        match e {
            ChunkError::Unavailable => UploadError::NetworkUnavailable,
            other => UploadError::Chunk(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ChunkAck, MemoryGateway};
    use crate::signer::Ed25519Signer;
    use crate::transaction::TransactionBuilder;
    use bytes::Bytes;
    use std::sync::Mutex;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    async fn signed_session(
        data: Vec<u8>,
        chunk_size: u32,
    ) -> (UploadSession, broadcast::Receiver<ProgressEvent>) {
        let signer = Ed25519Signer::generate();
        let data = Bytes::from(data);
        let tx = TransactionBuilder::new()
            .build(data.clone(), "application/octet-stream", false, &signer)
            .await
            .unwrap();
        let plan = ChunkPlan::plan(data.len() as u64, chunk_size).unwrap();
        let (progress_tx, progress_rx) = broadcast::channel(256);
        (
            UploadSession::new(tx, plan, None, fast_retry(), progress_tx),
            progress_rx,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Gateway that fails selected chunk indices a scripted number of times
    struct FlakyGateway {
        inner: MemoryGateway,
        failures: Mutex<HashMap<u32, u32>>,
        submissions: Mutex<Vec<u32>>,
    }

    impl FlakyGateway {
        fn failing(failures: &[(u32, u32)]) -> Self {
            Self {
                inner: MemoryGateway::new(),
                failures: Mutex::new(failures.iter().copied().collect()),
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> Vec<u32> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Network for FlakyGateway {
        async fn submit_header(&self, tx: &Transaction) -> std::result::Result<(), ChunkError> {
            self.inner.submit_header(tx).await
        }

        async fn submit_chunk(
            &self,
            id: &TransactionId,
            chunk: ChunkUpload,
        ) -> std::result::Result<ChunkAck, ChunkError> {
            self.submissions.lock().unwrap().push(chunk.index);
            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(&chunk.index) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(ChunkError::Transient("injected failure".to_string()));
                    }
                }
            }
            self.inner.submit_chunk(id, chunk).await
        }

        async fn status(
            &self,
            id: &TransactionId,
        ) -> std::result::Result<crate::network::TxStatus, ChunkError> {
            self.inner.status(id).await
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_in_order() {
        let gateway = FlakyGateway::failing(&[]);
        let (mut session, mut rx) = signed_session(vec![7u8; 1024 * 1024], 256 * 1024).await;

        let receipt = session.run(&gateway).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(receipt.id, session.transaction().id);
        assert_eq!(gateway.submissions(), vec![0, 1, 2, 3]);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        let last = events.last().unwrap();
        assert_eq!(last.pct_complete, 100.0);
        assert_eq!(last.acked_count, 4);
        assert_eq!(last.total_count, 4);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let gateway = FlakyGateway::failing(&[(1, 2), (3, 1)]);
        let (mut session, mut rx) = signed_session(vec![1u8; 5000], 1000).await;

        session.run(&gateway).await.unwrap();

        let events = drain(&mut rx);
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[1].pct_complete >= pair[0].pct_complete);
        }
        assert_eq!(events.last().unwrap().pct_complete, 100.0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_invisibly() {
        let gateway = FlakyGateway::failing(&[(2, 4)]);
        let (mut session, _rx) = signed_session(vec![9u8; 4000], 1000).await;

        session.run(&gateway).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        // Index 2 submitted 5 times (4 failures + 1 success)
        let count = gateway.submissions().iter().filter(|&&i| i == 2).count();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_with_chunk_index() {
        // Chunk 7 never succeeds within the 5-attempt budget
        let gateway = FlakyGateway::failing(&[(7, u32::MAX)]);
        let (mut session, _rx) = signed_session(vec![3u8; 10_000], 1000).await;

        let err = session.run(&gateway).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::RetryExhausted { chunk_index: 7, .. }
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            session.acked().iter().copied().collect::<Vec<_>>(),
            (0..7).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_resume_submits_only_missing_chunks() {
        let gateway = FlakyGateway::failing(&[(4, u32::MAX)]);
        let (mut session, _rx) = signed_session(vec![5u8; 8000], 1000).await;

        session.run(&gateway).await.unwrap_err();
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.acked().len(), 4);

        // The network recovers; retry the failing chunk on a fresh budget
        gateway.failures.lock().unwrap().remove(&4);
        let before = gateway.submissions().len();

        let receipt = session.resume(&gateway).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(receipt.id, session.transaction().id);

        // Only indices 4..8 were submitted after the resume
        let after: Vec<u32> = gateway.submissions()[before..].to_vec();
        assert_eq!(after, vec![4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let gateway = FlakyGateway::failing(&[]);
        let (mut session, _rx) = signed_session(vec![1u8; 100], 100).await;

        session.run(&gateway).await.unwrap();
        let err = session.run(&gateway).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidSessionState { .. }));
    }

    #[tokio::test]
    async fn test_resume_from_complete_is_rejected() {
        let gateway = FlakyGateway::failing(&[]);
        let (mut session, _rx) = signed_session(vec![1u8; 100], 100).await;

        session.run(&gateway).await.unwrap();
        let err = session.resume(&gateway).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidSessionState { .. }));
    }

    #[tokio::test]
    async fn test_permanent_error_fails_without_retry() {
        struct RejectingGateway;

        #[async_trait::async_trait]
        impl Network for RejectingGateway {
            async fn submit_header(
                &self,
                _tx: &Transaction,
            ) -> std::result::Result<(), ChunkError> {
                Ok(())
            }

            async fn submit_chunk(
                &self,
                _id: &TransactionId,
                _chunk: ChunkUpload,
            ) -> std::result::Result<ChunkAck, ChunkError> {
                Err(ChunkError::Permanent("payload rejected".to_string()))
            }

            async fn status(
                &self,
                _id: &TransactionId,
            ) -> std::result::Result<crate::network::TxStatus, ChunkError> {
                Ok(crate::network::TxStatus::NotFound)
            }
        }

        let (mut session, _rx) = signed_session(vec![1u8; 100], 100).await;
        let err = session.run(&RejectingGateway).await.unwrap_err();
        assert!(matches!(err, UploadError::Chunk(ChunkError::Permanent(_))));
        assert_eq!(session.state(), SessionState::Failed);
    }
}
