//! Observability instruments for the worker loops.
//!
//! The library records against OpenTelemetry instruments and leaves the
//! exporter wiring (OTLP endpoint, export interval) to the embedding
//! binary. Without an installed meter provider the instruments are no-ops,
//! which keeps tests and local runs free of setup.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

/// Instrument registry for a [`Worker`].
///
/// Cheap to clone; clones share the underlying instruments.
///
/// [`Worker`]: crate::worker::Worker
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// Number of records currently being processed.
    pub(crate) records_in_flight: UpDownCounter<i64>,

    /// Duration of record handler executions, in seconds.
    pub(crate) handle_duration: Histogram<f64>,

    /// Total records successfully dequeued.
    pub(crate) records_dequeued: Counter<u64>,

    /// Total records finalized in a non-success terminal state.
    pub(crate) handler_failures: Counter<u64>,
}

impl WorkerMetrics {
    /// Creates the worker instruments on the given meter.
    #[must_use]
    pub fn new(meter: &Meter) -> Self {
        Self {
            records_in_flight: meter
                .i64_up_down_counter("worker_records_in_flight")
                .with_description("Number of records currently being processed")
                .build(),
            handle_duration: meter
                .f64_histogram("worker_handle_duration_seconds")
                .with_description("Duration of record handler executions")
                .with_unit("s")
                .build(),
            records_dequeued: meter
                .u64_counter("worker_records_dequeued_total")
                .with_description("Total records successfully dequeued")
                .build(),
            handler_failures: meter
                .u64_counter("worker_handler_failures_total")
                .with_description("Total records finalized as errored or failed")
                .build(),
        }
    }
}

impl Default for WorkerMetrics {
    /// Instruments on the global meter; no-ops until a provider is
    /// installed.
    fn default() -> Self {
        Self::new(&opentelemetry::global::meter("queue-worker"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_provider_does_not_panic() {
        let metrics = WorkerMetrics::default();

        metrics.records_in_flight.add(1, &[]);
        metrics.records_in_flight.add(-1, &[]);
        metrics.handle_duration.record(0.25, &[]);
        metrics.records_dequeued.add(1, &[]);
        metrics.handler_failures.add(1, &[]);
    }
}
