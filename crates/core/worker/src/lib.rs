//! Generic distributed-safe queue worker.
//!
//! This crate provides a long-running worker that claims queued records
//! from a shared backing store, executes a user-supplied handler against
//! each with bounded parallelism, and reports terminal outcomes back to
//! the store. While a record is being processed the worker periodically
//! refreshes its claim (a heartbeat), so that peer workers sharing the
//! same queue can reliably detect abandonment and reclaim work after a
//! crash.
//!
//! The worker coordinates with its collaborators through two traits:
//! [`Store`] (dequeue-with-claim, heartbeat refresh, terminal marks) and
//! [`Handler`] (the record processing logic plus optional pre-dequeue and
//! pre/post-handle hooks). The queue's durability, scheduling fairness,
//! and claim staleness policy all belong to the store; the worker provides
//! at-least-once execution with a heartbeat-driven reclaim window.

mod config;
mod error;
mod handler;
mod hostname;
mod metrics;
mod record;
pub mod store;
mod worker;

pub use self::{
    config::WorkerConfig,
    error::{ConfigError, DequeueError, FinalizeError},
    handler::{HandleError, Handler, PreDequeue},
    metrics::WorkerMetrics,
    record::{Record, RecordId},
    store::Store,
    worker::Worker,
};

/// A type-erased error.
pub type BoxError = Box<dyn std::error::Error + Sync + Send + 'static>;

/// A result with a type-erased error.
pub type BoxResult<T> = Result<T, BoxError>;
