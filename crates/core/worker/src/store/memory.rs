//! In-memory [`Store`] implementation for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    BoxError,
    record::{Record, RecordId},
    store::Store,
};

/// A record held by the [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    id: RecordId,
    payload: serde_json::Value,
}

impl MemoryRecord {
    /// Creates a new record with an empty payload.
    #[must_use]
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Attaches an opaque payload to the record.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the record payload.
    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}

impl Record for MemoryRecord {
    fn record_id(&self) -> RecordId {
        self.id
    }
}

/// Terminal state of a record in the [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    /// The record completed successfully.
    Complete,
    /// The record errored and may be retried.
    Errored(String),
    /// The record failed and will not be retried.
    Failed(String),
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<MemoryRecord>,
    claims: HashMap<RecordId, String>,
    terminal: HashMap<RecordId, TerminalState>,
}

/// A claim-aware in-memory queue.
///
/// Records pushed with [`InMemoryStore::push`] are handed out in FIFO order.
/// Dequeuing claims the record for the given hostname; heartbeats report
/// which ids are still claimed; marks move the record to a terminal table
/// and release the claim.
///
/// [`InMemoryStore::revoke`] drops a claim without marking the record,
/// simulating a claim that expired and was reclaimed by the store. The
/// record's subsequent mark call will be declined.
///
/// Cloning the store is cheap and shares the underlying state, so tests can
/// keep a handle while the worker owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a record.
    pub fn push(&self, record: MemoryRecord) {
        self.state.lock().queue.push_back(record);
    }

    /// Drops the claim on a record without marking it, simulating a claim
    /// that expired and was reclaimed.
    pub fn revoke(&self, id: RecordId) {
        self.state.lock().claims.remove(&id);
    }

    /// Returns the terminal state of a record, if it reached one.
    #[must_use]
    pub fn terminal_state(&self, id: RecordId) -> Option<TerminalState> {
        self.state.lock().terminal.get(&id).cloned()
    }

    /// Returns the ids currently claimed by workers.
    #[must_use]
    pub fn claimed_ids(&self) -> Vec<RecordId> {
        self.state.lock().claims.keys().copied().collect()
    }

    /// Returns the number of records still queued.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn mark(&self, id: RecordId, terminal: TerminalState) -> bool {
        let mut state = self.state.lock();
        if state.claims.remove(&id).is_none() {
            // Already terminal, or the claim was reclaimed.
            return false;
        }
        state.terminal.insert(id, terminal);
        true
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Record = MemoryRecord;
    type Extra = serde_json::Value;

    async fn dequeue(
        &self,
        worker_hostname: &str,
        _extra: Option<&Self::Extra>,
    ) -> Result<Option<Self::Record>, BoxError> {
        let mut state = self.state.lock();
        let Some(record) = state.queue.pop_front() else {
            return Ok(None);
        };
        state
            .claims
            .insert(record.record_id(), worker_hostname.to_string());
        Ok(Some(record))
    }

    async fn heartbeat(&self, ids: &[RecordId]) -> Result<Vec<RecordId>, BoxError> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.claims.contains_key(id))
            .collect())
    }

    async fn mark_complete(&self, id: RecordId) -> Result<bool, BoxError> {
        Ok(self.mark(id, TerminalState::Complete))
    }

    async fn mark_errored(&self, id: RecordId, message: &str) -> Result<bool, BoxError> {
        Ok(self.mark(id, TerminalState::Errored(message.to_string())))
    }

    async fn mark_failed(&self, id: RecordId, message: &str) -> Result<bool, BoxError> {
        Ok(self.mark(id, TerminalState::Failed(message.to_string())))
    }
}
