//! The engine boundary: `list`/`atomic`/`watch`, the
//! three primitives the relay translates datapath requests into. Nothing
//! above this trait needs to know whether the engine is in-process or a
//! remote service — `MemoryEngine` (in [`crate::store`]) is the one
//! implementation this crate ships.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// An engine-side value, already decoded out of its storage representation.
/// The wire envelope shape lives in [`crate::value`]; this is what the engine
/// itself hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineValue {
    Bytes(Vec<u8>),
    Counter(u64),
    /// Opaque structured blob — round-tripped verbatim, never inspected.
    Structured(Vec<u8>),
}

/// One stored entry as returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEntry {
    pub key: Vec<u8>,
    pub value: EngineValue,
    /// Hex-encoded 10-byte versionstamp.
    pub versionstamp: String,
}

/// A range selector built from a decoded, endpoint-promoted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSelector {
    /// Both endpoints are exact encoded keys: `[start_key, end_key)`.
    Range { start_key: Vec<u8>, end_key: Vec<u8> },
    /// `end` was a `before` marker: scan everything with `prefix` starting at `start_key`.
    Prefix { start_key: Vec<u8>, prefix: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListOptions {
    /// 0 means unbounded.
    pub limit: u32,
    pub reverse: bool,
}

/// An optimistic check attached to an atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCheck {
    pub key: Vec<u8>,
    /// `None` means "expect no entry"; `Some(hex)` expects that exact versionstamp.
    pub versionstamp: Option<String>,
}

/// One mutation attached to an atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMutation {
    Set { key: Vec<u8>, value: EngineValue, expire_in_ms: Option<i64> },
    Delete { key: Vec<u8> },
    Sum { key: Vec<u8>, delta: u64 },
    Max { key: Vec<u8>, value: u64 },
    Min { key: Vec<u8>, value: u64 },
    /// The engine appends the commit versionstamp to `key_prefix` at commit time.
    SetSuffixVersionstamped { key_prefix: Vec<u8>, value: EngineValue, expire_in_ms: Option<i64> },
}

/// One deferred message attached to an atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEnqueue {
    pub payload: Vec<u8>,
    pub delay_ms: Option<i64>,
    pub keys_if_undelivered: Vec<Vec<u8>>,
    pub backoff_schedule: Vec<u32>,
}

/// The outcome of committing an atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Success { versionstamp: String },
    CheckFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine I/O error: {0}")]
    Io(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

/// One change per watched key, in request order, for a single update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchKeyChange {
    pub changed: bool,
    /// `None` iff the engine reports no current entry for that key.
    pub entry: Option<EngineEntry>,
}

pub type WatchBatch = Vec<WatchKeyChange>;

/// A builder for one atomic transaction. Checks/mutations/enqueues are
/// attached in call order and must be observed by the engine in that exact
/// order.
#[async_trait]
pub trait AtomicTransactionBuilder: Send {
    fn check(&mut self, check: EngineCheck);
    fn mutate(&mut self, mutation: EngineMutation);
    fn enqueue(&mut self, enqueue: EngineEnqueue);
    async fn commit(self: Box<Self>) -> Result<CommitOutcome, EngineError>;
}

#[async_trait]
pub trait Engine: Send + Sync {
    async fn list(
        &self,
        selector: RangeSelector,
        options: ListOptions,
    ) -> Result<Vec<EngineEntry>, EngineError>;

    fn atomic(&self) -> Box<dyn AtomicTransactionBuilder>;

    fn watch(&self, keys: Vec<Vec<u8>>) -> BoxStream<'static, Result<WatchBatch, EngineError>>;
}
