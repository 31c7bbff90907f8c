//! Worker configuration.

use std::time::Duration;

use crate::{error::ConfigError, metrics::WorkerMetrics};

/// Configuration for a [`Worker`].
///
/// [`Worker`]: crate::worker::Worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the worker, used to distinguish log messages and emitted
    /// metrics between workers sharing a process. Construction fails if
    /// this field is empty.
    pub name: String,

    /// Hostname sent to the store as this worker's claim identity.
    ///
    /// If not supplied, it is derived from the `HOSTNAME` environment
    /// variable, then from the OS hostname, at construction time.
    pub worker_hostname: Option<String>,

    /// Maximum number of handlers that can run concurrently. The store is
    /// not queried while all handler slots are occupied. Must be non-zero.
    pub num_handlers: usize,

    /// Stops the dequeue loop after this many successful dequeues.
    /// Records still in flight at that point run to completion. `None`
    /// means no limit.
    pub num_total_records: Option<u64>,

    /// Stops the dequeue loop after this much active time. Records still
    /// in flight at that point run to completion. `None` means no limit.
    pub max_active_time: Option<Duration>,

    /// Poll delay after an empty or failed dequeue.
    pub interval: Duration,

    /// Period between heartbeat refreshes of the in-flight record claims.
    pub heartbeat_interval: Duration,

    /// Instruments for the work loop.
    pub metrics: WorkerMetrics,
}

impl WorkerConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.num_handlers == 0 {
            return Err(ConfigError::ZeroHandlers);
        }
        Ok(())
    }
}
