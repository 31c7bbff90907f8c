//! Backing store contract for the worker.
//!
//! The store owns the queue: it decides which record a worker receives,
//! tracks per-worker claims, and records terminal outcomes. The worker only
//! ever talks to the store through the [`Store`] trait; the store's own
//! implementation (schema, locking, staleness windows) is out of scope here.

pub mod memory;

use async_trait::async_trait;

use crate::{
    BoxError,
    record::{Record, RecordId},
};

/// The queue backing a [`Worker`].
///
/// Implementations are expected to set a visible claim on each dequeued
/// record, keyed by the worker hostname, so that the periodic heartbeat can
/// refresh it. A claim that is not refreshed within the store's staleness
/// window may be reclaimed and handed to another worker.
///
/// All methods are `Send + Sync` to support concurrent access from the
/// dequeue loop, the heartbeat loop, and handler tasks.
///
/// [`Worker`]: crate::worker::Worker
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// The record type this store produces.
    type Record: Record;

    /// Opaque extra dequeue arguments threaded from
    /// [`Handler::pre_dequeue`] into [`Store::dequeue`].
    ///
    /// [`Handler::pre_dequeue`]: crate::handler::Handler::pre_dequeue
    type Extra: Send + Sync;

    /// Atomically claims one queued record for this worker identity.
    ///
    /// Returns `Ok(None)` when no record is available; this is not an
    /// error and the worker will poll again after its configured interval.
    async fn dequeue(
        &self,
        worker_hostname: &str,
        extra: Option<&Self::Extra>,
    ) -> Result<Option<Self::Record>, BoxError>;

    /// Refreshes the claim timestamp on each of `ids` still owned by this
    /// worker, and returns the subset the store recognizes as claimed.
    ///
    /// Ids passed in but absent from the returned set are records this
    /// worker has lost (claim expired or reassigned). An empty `ids` slice
    /// must be treated as a no-op returning an empty set.
    async fn heartbeat(&self, ids: &[RecordId]) -> Result<Vec<RecordId>, BoxError>;

    /// Moves the record to the `Complete` terminal state.
    ///
    /// Returns `Ok(false)` when the store did not transition the record
    /// (already terminal or reclaimed); this is non-fatal.
    async fn mark_complete(&self, id: RecordId) -> Result<bool, BoxError>;

    /// Moves the record to the `Errored` terminal state.
    ///
    /// Errored records are retryable: the store will hand them out again
    /// later. Returns `Ok(false)` when the store declined the transition.
    async fn mark_errored(&self, id: RecordId, message: &str) -> Result<bool, BoxError>;

    /// Moves the record to the `Failed` terminal state.
    ///
    /// Failed records are not retryable. Returns `Ok(false)` when the
    /// store declined the transition.
    async fn mark_failed(&self, id: RecordId, message: &str) -> Result<bool, BoxError>;
}
