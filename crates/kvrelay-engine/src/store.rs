//! `MemoryEngine` — an in-process [`Engine`] backed by a `DashMap` for point
//! lookups and a `parking_lot`-guarded `BTreeMap` for ordered range scans
//! (`DashMap` alone has no stable iteration order, which range reads need).
//!
//! Versionstamps are a monotonically increasing 8-byte commit counter plus a
//! fixed 2-byte suffix, formatted as the 10-byte hex string the engine
//! boundary expects.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::engine::{
    AtomicTransactionBuilder, CommitOutcome, Engine, EngineCheck, EngineEnqueue, EngineEntry,
    EngineError, EngineMutation, EngineValue, ListOptions, RangeSelector, WatchBatch,
    WatchKeyChange,
};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: EngineValue,
    versionstamp: [u8; 10],
}

fn format_versionstamp(raw: [u8; 10]) -> String {
    hex::encode(raw)
}

fn parse_versionstamp(hex_str: &str) -> Option<[u8; 10]> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

/// `MemoryEngine` is the one `Engine` implementation this crate ships: a
/// process-local store with no durability, intended for tests and for
/// `kvrelayd` when no external engine is configured.
#[derive(Clone)]
pub struct MemoryEngine {
    points: Arc<DashMap<Vec<u8>, StoredEntry>>,
    ordered: Arc<Mutex<BTreeMap<Vec<u8>, ()>>>,
    commit_counter: Arc<AtomicU64>,
    watchers: Arc<DashMap<Vec<u8>, watch::Sender<()>>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            points: Arc::new(DashMap::new()),
            ordered: Arc::new(Mutex::new(BTreeMap::new())),
            commit_counter: Arc::new(AtomicU64::new(0)),
            watchers: Arc::new(DashMap::new()),
        }
    }

    fn next_versionstamp(&self) -> [u8; 10] {
        let counter = self.commit_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut raw = [0u8; 10];
        raw[..8].copy_from_slice(&counter.to_be_bytes());
        raw
    }

    fn insert(&self, key: Vec<u8>, value: EngineValue, versionstamp: [u8; 10]) {
        self.ordered.lock().insert(key.clone(), ());
        self.points.insert(key.clone(), StoredEntry { value, versionstamp });
        self.notify(&key);
    }

    fn remove(&self, key: &[u8]) {
        self.ordered.lock().remove(key);
        self.points.remove(key);
        self.notify(key);
    }

    fn notify(&self, key: &[u8]) {
        if let Some(sender) = self.watchers.get(key) {
            let _ = sender.send(());
        }
    }

    fn entry_for(&self, key: &[u8]) -> Option<EngineEntry> {
        self.points.get(key).map(|stored| EngineEntry {
            key: key.to_vec(),
            value: stored.value.clone(),
            versionstamp: format_versionstamp(stored.versionstamp),
        })
    }

    /// Inserts a value directly under a freshly minted versionstamp, bypassing
    /// the check/commit machinery. Used only by `kvrelayd`'s optional startup
    /// seeding from a data-file snapshot — not part of the
    /// wire-translation core, and not reachable from any HTTP endpoint.
    pub fn seed(&self, key: Vec<u8>, value: EngineValue) {
        let versionstamp = self.next_versionstamp();
        self.insert(key, value, versionstamp);
    }

    /// All live entries, in key order. Used by `kvrelayd --dump-path` to
    /// write a snapshot on shutdown; not part of the `Engine` trait since no
    /// datapath request needs an unbounded full-table scan.
    pub fn snapshot_entries(&self) -> Vec<EngineEntry> {
        let ordered = self.ordered.lock();
        ordered.keys().filter_map(|k| self.entry_for(k)).collect()
    }

    fn range_keys(&self, selector: &RangeSelector, options: &ListOptions) -> Vec<Vec<u8>> {
        let ordered = self.ordered.lock();
        let mut keys: Vec<Vec<u8>> = match selector {
            RangeSelector::Range { start_key, end_key } => ordered
                .range((Bound::Included(start_key.clone()), Bound::Excluded(end_key.clone())))
                .map(|(k, _)| k.clone())
                .collect(),
            RangeSelector::Prefix { start_key, prefix } => ordered
                .range((Bound::Included(start_key.clone()), Bound::Unbounded))
                .map(|(k, _)| k.clone())
                .take_while(|k| k.starts_with(prefix.as_slice()))
                .collect(),
        };
        if options.reverse {
            keys.reverse();
        }
        if options.limit > 0 {
            keys.truncate(options.limit as usize);
        }
        keys
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn list(
        &self,
        selector: RangeSelector,
        options: ListOptions,
    ) -> Result<Vec<EngineEntry>, EngineError> {
        let keys = self.range_keys(&selector, &options);
        Ok(keys.into_iter().filter_map(|k| self.entry_for(&k)).collect())
    }

    fn atomic(&self) -> Box<dyn AtomicTransactionBuilder> {
        Box::new(MemoryTransaction {
            points: self.points.clone(),
            ordered: self.ordered.clone(),
            commit_counter: self.commit_counter.clone(),
            watchers: self.watchers.clone(),
            checks: Vec::new(),
            mutations: Vec::new(),
            enqueues: Vec::new(),
        })
    }

    fn watch(&self, keys: Vec<Vec<u8>>) -> BoxStream<'static, Result<WatchBatch, EngineError>> {
        let points = self.points.clone();
        let watchers = self.watchers.clone();

        let mut receivers = Vec::with_capacity(keys.len());
        for key in &keys {
            let sender = watchers
                .entry(key.clone())
                .or_insert_with(|| watch::channel(()).0)
                .clone();
            receivers.push(sender.subscribe());
        }

        stream::unfold((keys, receivers, points), move |(keys, mut receivers, points)| async move {
            if receivers.is_empty() {
                return None;
            }
            let (changed, _, _) = futures::future::select_all(
                receivers.iter_mut().map(|r| Box::pin(r.changed())),
            )
            .await;
            if changed.is_err() {
                return None;
            }

            let batch: WatchBatch = keys
                .iter()
                .map(|key| {
                    let entry = points.get(key).map(|stored| EngineEntry {
                        key: key.clone(),
                        value: stored.value.clone(),
                        versionstamp: format_versionstamp(stored.versionstamp),
                    });
                    WatchKeyChange { changed: true, entry }
                })
                .collect();

            Some((Ok(batch), (keys, receivers, points)))
        })
        .boxed()
    }
}

struct MemoryTransaction {
    points: Arc<DashMap<Vec<u8>, StoredEntry>>,
    ordered: Arc<Mutex<BTreeMap<Vec<u8>, ()>>>,
    commit_counter: Arc<AtomicU64>,
    watchers: Arc<DashMap<Vec<u8>, watch::Sender<()>>>,
    checks: Vec<EngineCheck>,
    mutations: Vec<EngineMutation>,
    enqueues: Vec<EngineEnqueue>,
}

impl MemoryTransaction {
    fn next_versionstamp(&self) -> [u8; 10] {
        let counter = self.commit_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut raw = [0u8; 10];
        raw[..8].copy_from_slice(&counter.to_be_bytes());
        raw
    }

    fn notify(&self, key: &[u8]) {
        if let Some(sender) = self.watchers.get(key) {
            let _ = sender.send(());
        }
    }

    fn current_versionstamp(&self, key: &[u8]) -> Option<String> {
        self.points.get(key).map(|stored| format_versionstamp(stored.versionstamp))
    }

    fn read_counter(&self, key: &[u8]) -> u64 {
        match self.points.get(key).map(|stored| stored.value.clone()) {
            Some(EngineValue::Counter(v)) => v,
            _ => 0,
        }
    }

    fn store(&self, key: Vec<u8>, value: EngineValue, versionstamp: [u8; 10]) {
        self.ordered.lock().insert(key.clone(), ());
        self.points.insert(key.clone(), StoredEntry { value, versionstamp });
        self.notify(&key);
    }

    fn remove(&self, key: &[u8]) {
        self.ordered.lock().remove(key);
        self.points.remove(key);
        self.notify(key);
    }
}

#[async_trait]
impl AtomicTransactionBuilder for MemoryTransaction {
    fn check(&mut self, check: EngineCheck) {
        self.checks.push(check);
    }

    fn mutate(&mut self, mutation: EngineMutation) {
        self.mutations.push(mutation);
    }

    fn enqueue(&mut self, enqueue: EngineEnqueue) {
        self.enqueues.push(enqueue);
    }

    async fn commit(self: Box<Self>) -> Result<CommitOutcome, EngineError> {
        for check in &self.checks {
            let current = self.current_versionstamp(&check.key);
            if current != check.versionstamp {
                return Ok(CommitOutcome::CheckFailure);
            }
        }

        let commit_versionstamp = self.next_versionstamp();

        for mutation in &self.mutations {
            match mutation {
                EngineMutation::Set { key, value, .. } => {
                    self.store(key.clone(), value.clone(), commit_versionstamp);
                }
                EngineMutation::Delete { key } => {
                    self.remove(key);
                }
                EngineMutation::Sum { key, delta } => {
                    let next = self.read_counter(key).wrapping_add(*delta);
                    self.store(key.clone(), EngineValue::Counter(next), commit_versionstamp);
                }
                EngineMutation::Max { key, value } => {
                    let next = self.read_counter(key).max(*value);
                    self.store(key.clone(), EngineValue::Counter(next), commit_versionstamp);
                }
                EngineMutation::Min { key, value } => {
                    let current = self.read_counter(key);
                    let next = if self.points.contains_key(key) { current.min(*value) } else { *value };
                    self.store(key.clone(), EngineValue::Counter(next), commit_versionstamp);
                }
                EngineMutation::SetSuffixVersionstamped { key_prefix, value, .. } => {
                    let mut full_key = key_prefix.clone();
                    full_key.extend_from_slice(&commit_versionstamp);
                    self.store(full_key, value.clone(), commit_versionstamp);
                }
            }
        }

        // Enqueues have no observable effect in the in-process engine beyond
        // ordering guarantees, which `self.enqueues` already preserves by
        // having been attached in call order; there is no queue consumer to
        // hand them to here.
        let _ = &self.enqueues;

        Ok(CommitOutcome::Success { versionstamp: format_versionstamp(commit_versionstamp) })
    }
}
