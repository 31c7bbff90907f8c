//! Tracking of records currently being processed by a worker.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::record::RecordId;

/// The set of in-flight record ids, each paired with the cancellation
/// token of its handler.
///
/// Membership defines the heartbeat set: every id in here is refreshed on
/// the next heartbeat tick. Cancellation and removal are deliberately
/// separate operations: [`RunningSet::cancel`] fires a record's token but
/// leaves the entry in place, and the handler's own cleanup path is the
/// sole remover. This keeps the heartbeat reclaim path and the handler
/// completion path from racing over the same entry.
#[derive(Debug, Default)]
pub(crate) struct RunningSet {
    records: Mutex<HashMap<RecordId, CancellationToken>>,
}

impl RunningSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a record. Returns `false` if the id is already present,
    /// in which case the set is unchanged.
    pub(crate) fn insert(&self, id: RecordId, cancel: CancellationToken) -> bool {
        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return false;
        }
        records.insert(id, cancel);
        true
    }

    /// Deregisters a record. Idempotent.
    pub(crate) fn remove(&self, id: RecordId) {
        self.records.lock().remove(&id);
    }

    /// Fires the cancellation token of a record, if present.
    ///
    /// Does not remove the entry; the handler's cleanup does that once it
    /// observes the cancellation.
    pub(crate) fn cancel(&self, id: RecordId) {
        if let Some(token) = self.records.lock().get(&id) {
            token.cancel();
        }
    }

    /// Returns `true` if the record is currently registered.
    pub(crate) fn contains(&self, id: RecordId) -> bool {
        self.records.lock().contains_key(&id)
    }

    /// Returns a snapshot of the currently registered ids, in no
    /// particular order.
    pub(crate) fn ids(&self) -> Vec<RecordId> {
        self.records.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicates() {
        let set = RunningSet::new();
        assert!(set.insert(RecordId::new(1), CancellationToken::new()));
        assert!(!set.insert(RecordId::new(1), CancellationToken::new()));
        assert!(set.contains(RecordId::new(1)));
    }

    #[test]
    fn remove_is_idempotent() {
        let set = RunningSet::new();
        set.insert(RecordId::new(1), CancellationToken::new());
        set.remove(RecordId::new(1));
        set.remove(RecordId::new(1));
        assert!(!set.contains(RecordId::new(1)));
    }

    #[test]
    fn cancel_fires_the_token_but_keeps_the_entry() {
        //* Given
        let set = RunningSet::new();
        let token = CancellationToken::new();
        set.insert(RecordId::new(5), token.clone());

        //* When
        set.cancel(RecordId::new(5));

        //* Then
        assert!(token.is_cancelled());
        assert!(set.contains(RecordId::new(5)));
    }

    #[test]
    fn cancel_of_an_unknown_id_is_a_noop() {
        let set = RunningSet::new();
        set.cancel(RecordId::new(9));
        assert!(!set.contains(RecordId::new(9)));
    }

    #[test]
    fn ids_returns_a_snapshot() {
        //* Given
        let set = RunningSet::new();
        set.insert(RecordId::new(1), CancellationToken::new());
        set.insert(RecordId::new(2), CancellationToken::new());

        //* When
        let mut snapshot = set.ids();
        set.remove(RecordId::new(1));

        //* Then
        snapshot.sort_unstable();
        assert_eq!(snapshot, vec![RecordId::new(1), RecordId::new(2)]);
        assert_eq!(set.ids(), vec![RecordId::new(2)]);
    }
}
