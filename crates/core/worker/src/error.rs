//! Error types for worker construction and the dequeue/finalize pipeline.
//!
//! The worker handles every runtime error at the boundary of a single
//! dequeue-and-handle iteration; nothing here escapes to the caller of
//! [`Worker::run`]. Only [`ConfigError`] is surfaced, at construction time.
//!
//! [`Worker::run`]: crate::worker::Worker::run

use crate::{BoxError, record::RecordId};

/// Errors that reject a [`WorkerConfig`] at construction time.
///
/// [`WorkerConfig`]: crate::config::WorkerConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The worker name is empty.
    ///
    /// The name distinguishes log messages and metrics between workers
    /// sharing a process, so construction refuses to proceed without one.
    #[error("worker name must not be empty")]
    MissingName,

    /// The handler slot count is zero.
    ///
    /// A worker with no handler slots could never dequeue, so this is
    /// always a configuration mistake.
    #[error("worker must be configured with at least one handler slot")]
    ZeroHandlers,

    /// Worker hostname resolution failed.
    ///
    /// Raised only when no explicit hostname was configured and neither
    /// the `HOSTNAME` environment variable nor the OS hostname was
    /// available.
    #[error("failed to resolve worker hostname")]
    Hostname(#[source] std::io::Error),
}

/// Errors from a single dequeue-and-handle iteration.
///
/// None of these are fatal to the worker: [`DequeueError::Shutdown`] exits
/// the loop silently, and everything else is logged before the loop
/// continues with its poll interval.
#[derive(Debug, thiserror::Error)]
pub enum DequeueError {
    /// The handler's pre-dequeue hook failed.
    #[error("pre-dequeue hook failed")]
    PreDequeue(#[source] BoxError),

    /// The store failed to dequeue.
    #[error("store dequeue failed")]
    Dequeue(#[source] BoxError),

    /// The store returned a record this worker is already processing.
    ///
    /// The dequeued copy is dropped; the in-flight handler keeps running.
    #[error("record {id} is already being processed by this worker")]
    RecordAlreadyRunning {
        /// The duplicated record id.
        id: RecordId,
    },

    /// The worker root was canceled while this iteration was in flight.
    #[error("worker is shutting down")]
    Shutdown,
}

/// Errors from reporting a record's terminal state to the store.
///
/// Finalize errors are logged in the handler task and never retried; the
/// record's claim will lapse and the store will requeue or expire it
/// according to its own policy.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// The store failed to mark the record complete.
    #[error("failed to mark record {id} as complete")]
    MarkComplete {
        /// The record being finalized.
        id: RecordId,
        #[source]
        source: BoxError,
    },

    /// The store failed to mark the record errored.
    #[error("failed to mark record {id} as errored")]
    MarkErrored {
        /// The record being finalized.
        id: RecordId,
        #[source]
        source: BoxError,
    },

    /// The store failed to mark the record failed.
    #[error("failed to mark record {id} as failed")]
    MarkFailed {
        /// The record being finalized.
        id: RecordId,
        #[source]
        source: BoxError,
    },
}
