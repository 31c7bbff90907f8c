//! The worker: dequeue loop, heartbeat loop, and record lifecycle.

mod running_set;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use self::running_set::RunningSet;
use crate::{
    config::WorkerConfig,
    error::{ConfigError, DequeueError, FinalizeError},
    handler::{HandleError, Handler, PreDequeue},
    metrics::WorkerMetrics,
    record::{Record, RecordId},
    store::Store,
};

/// A generic consumer of records from a shared backing store.
///
/// The worker repeatedly claims queued records, executes the handler
/// against each with bounded parallelism, reports terminal outcomes back
/// to the store, and heartbeats every in-flight record so that peer
/// workers sharing the queue can detect abandonment and reclaim work.
///
/// # Lifecycle
///
/// [`Worker::run`] drives the dequeue and heartbeat loops and returns once
/// the dequeue loop has exited and every in-flight handler has drained.
/// The loop exits on [`Worker::stop`], after
/// [`WorkerConfig::max_active_time`], or after
/// [`WorkerConfig::num_total_records`] successful dequeues. `run` must be
/// called at most once per worker.
///
/// The worker runs under the cancellation token supplied at construction:
/// cancelling that token is equivalent to calling [`Worker::stop`] from the
/// outside, so a process-wide shutdown token terminates every worker
/// derived from it.
///
/// ```rust,no_run
/// # use std::{sync::Arc, time::Duration};
/// # use tokio_util::sync::CancellationToken;
/// # use queue_worker::{Worker, WorkerConfig, WorkerMetrics};
/// # use queue_worker::store::memory::InMemoryStore;
/// # async fn example<H: queue_worker::Handler<InMemoryStore>>(store: InMemoryStore, handler: H) {
/// let shutdown = CancellationToken::new();
/// let worker = Arc::new(
///     Worker::new(
///         store,
///         handler,
///         WorkerConfig {
///             name: "codeintel".to_string(),
///             worker_hostname: None,
///             num_handlers: 4,
///             num_total_records: None,
///             max_active_time: None,
///             interval: Duration::from_secs(1),
///             heartbeat_interval: Duration::from_secs(5),
///             metrics: WorkerMetrics::default(),
///         },
///         shutdown.clone(),
///     )
///     .expect("invalid worker config"),
/// );
///
/// let run = tokio::spawn({
///     let worker = Arc::clone(&worker);
///     async move { worker.run().await }
/// });
///
/// // ... later, on shutdown:
/// worker.stop().await;
/// run.await.expect("worker task panicked");
/// # }
/// ```
pub struct Worker<S: Store, H: Handler<S>> {
    store: Arc<S>,
    handler: Arc<H>,
    config: WorkerConfig,
    /// Claim identity sent to the store, resolved at construction.
    hostname: String,
    /// Cancels both loops and every in-flight handler token.
    root: CancellationToken,
    /// Fired once the dequeue loop has exited and all handlers drained.
    finished: CancellationToken,
    /// Available handler slots; a permit is held from just before each
    /// dequeue attempt until the corresponding handler task finishes.
    semaphore: Arc<Semaphore>,
    /// In-flight handler tasks, awaited during shutdown.
    tracker: TaskTracker,
    /// Ids currently being processed, i.e. the heartbeat set.
    running: Arc<RunningSet>,
}

impl<S: Store, H: Handler<S>> Worker<S, H> {
    /// Creates a new worker running under `shutdown`.
    ///
    /// The worker's root token is derived from `shutdown`, so cancelling
    /// `shutdown` terminates this worker (and any siblings derived from the
    /// same token), while [`Worker::stop`] cancels only this worker's own
    /// root.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or the
    /// worker hostname cannot be resolved.
    pub fn new(
        store: S,
        handler: H,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let hostname = crate::hostname::resolve(config.worker_hostname.clone())?;

        Ok(Self {
            store: Arc::new(store),
            handler: Arc::new(handler),
            hostname,
            root: shutdown.child_token(),
            finished: CancellationToken::new(),
            semaphore: Arc::new(Semaphore::new(config.num_handlers)),
            tracker: TaskTracker::new(),
            running: Arc::new(RunningSet::new()),
            config,
        })
    }

    /// Runs the worker until a termination condition is met, then drains.
    ///
    /// Returns once the dequeue loop has exited and every in-flight
    /// handler task has completed. The heartbeat task exits only on root
    /// cancellation: when the dequeue loop stops because of one of the
    /// configured caps instead, the heartbeat keeps running until
    /// [`Worker::stop`] (or the construction-time shutdown token) cancels
    /// the root.
    pub async fn run(&self) {
        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.running),
            self.config.heartbeat_interval,
            self.root.clone(),
            self.config.name.clone(),
        ));

        let deadline = self.config.max_active_time.map(|max| Instant::now() + max);
        let mut num_dequeues: u64 = 0;
        let mut reason = "shutdown requested";

        loop {
            if let Some(limit) = self.config.num_total_records
                && num_dequeues >= limit
            {
                reason = "max total records dequeued";
                break;
            }

            let dequeued = match self.dequeue_and_handle().await {
                Ok(dequeued) => dequeued,
                Err(DequeueError::Shutdown) => break,
                Err(error) => {
                    tracing::error!(
                        name = %self.config.name,
                        error = %error,
                        "failed to dequeue and handle record"
                    );
                    false
                }
            };

            // A successful dequeue means work is plentiful: skip the poll
            // interval and immediately try for another handler slot.
            let delay = if dequeued {
                num_dequeues += 1;
                self.config.metrics.records_dequeued.add(1, &[]);
                Duration::ZERO
            } else {
                self.config.interval
            };

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.root.cancelled() => break,
                () = deadline_elapsed(deadline) => {
                    reason = "max active time elapsed";
                    break;
                }
            }
        }

        tracing::info!(name = %self.config.name, reason, "shutting down dequeue loop");

        self.tracker.close();
        self.tracker.wait().await;

        // In-flight records were heartbeated until the last handler
        // drained. The heartbeat task exits solely on root cancellation:
        // collect it if the root is gone, otherwise leave it ticking until
        // stop() cancels the root.
        if self.root.is_cancelled() {
            let _ = heartbeat.await;
        } else {
            drop(heartbeat);
        }

        self.finished.cancel();
    }

    /// Stops the worker and waits for in-flight handlers to drain.
    ///
    /// Cancels the root token, which makes the dequeue loop exit after its
    /// current iteration and fires every in-flight handler's cancellation
    /// token. Idempotent.
    pub async fn stop(&self) {
        self.root.cancel();
        self.wait().await;
    }

    /// Waits until the worker has fully terminated.
    ///
    /// Returns immediately when called after termination.
    pub async fn wait(&self) {
        self.finished.cancelled().await;
    }

    /// Cancels the in-flight record with the given id.
    ///
    /// Fires that record's cancellation token only; the dequeue loop is
    /// unaffected. The record will be marked failed once its handler
    /// returns. A no-op if the id is not currently in flight.
    pub fn cancel(&self, id: RecordId) {
        self.running.cancel(id);
    }

    /// Returns a snapshot of the record ids currently being processed.
    #[must_use]
    pub fn running_ids(&self) -> Vec<RecordId> {
        self.running.ids()
    }

    /// Attempts to dequeue and hand one record off to a handler task.
    ///
    /// Returns `Ok(false)` if no record was available. Errors are reported
    /// to the caller for logging; none of them are fatal to the loop
    /// except [`DequeueError::Shutdown`].
    async fn dequeue_and_handle(&self) -> Result<bool, DequeueError> {
        // Block here until a handler slot frees up, so the configured
        // concurrency limit is never exceeded. The permit travels into the
        // handler task on success and is dropped (released) on every other
        // path out of this function.
        let permit = tokio::select! {
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.expect("handler semaphore is never closed")
            }
            () = self.root.cancelled() => return Err(DequeueError::Shutdown),
        };

        let extra = match self.handler.pre_dequeue().await {
            Ok(PreDequeue::Dequeue(extra)) => extra,
            Ok(PreDequeue::Skip) => return Ok(false),
            Err(source) => return Err(DequeueError::PreDequeue(source)),
        };

        let record = tokio::select! {
            result = self.store.dequeue(&self.hostname, extra.as_ref()) => {
                result.map_err(DequeueError::Dequeue)?
            }
            () = self.root.cancelled() => return Err(DequeueError::Shutdown),
        };
        let Some(record) = record else {
            // Nothing to process.
            return Ok(false);
        };

        let id = record.record_id();
        let cancel = self.root.child_token();

        // Register the record so it is included in heartbeat refreshes.
        if !self.running.insert(id, cancel.clone()) {
            return Err(DequeueError::RecordAlreadyRunning { id });
        }

        self.config.metrics.records_in_flight.add(1, &[]);
        tracing::debug!(
            name = %self.config.name,
            record_id = %id,
            "dequeued record for processing"
        );

        self.handler.pre_handle(&record).await;

        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        let running = Arc::clone(&self.running);
        let metrics = self.config.metrics.clone();
        let name = self.config.name.clone();

        self.tracker.spawn(async move {
            // Locals drop in reverse declaration order: the cleanup guard
            // deregisters the record and decrements the in-flight gauge
            // before the permit releases the handler slot, on every exit
            // path including panics.
            let _permit = permit;
            let _cleanup = CleanupGuard {
                running: Arc::clone(&running),
                metrics: metrics.clone(),
                id,
            };

            let started = std::time::Instant::now();
            let result = handler.handle(&cancel, &record).await;
            metrics
                .handle_duration
                .record(started.elapsed().as_secs_f64(), &[]);

            if let Err(error) = finalize(
                store.as_ref(),
                running.as_ref(),
                &metrics,
                &name,
                id,
                &cancel,
                result,
            )
            .await
            {
                tracing::error!(
                    name = %name,
                    record_id = %id,
                    error = %error,
                    "failed to finalize record"
                );
            }

            // The record is no longer owned by this worker; the hook runs
            // before deregistration so a concurrent cancel still finds the
            // entry.
            handler.post_handle(&record).await;
        });

        Ok(true)
    }
}

/// Deregisters a record and decrements the in-flight gauge on drop.
struct CleanupGuard {
    running: Arc<RunningSet>,
    metrics: WorkerMetrics,
    id: RecordId,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.running.remove(self.id);
        self.metrics.records_in_flight.add(-1, &[]);
    }
}

/// Reports the handler outcome to the store as exactly one terminal state.
///
/// Cancellation is judged from the record's own token, not from the error
/// the handler chose to return: any handler failure with the token fired
/// and the id still registered is marked failed, even if the handler
/// swallowed the cancellation into an ordinary error. The registration
/// check tells an external [`Worker::cancel`] (entry still present) apart
/// from a record whose claim was lost and already removed by the heartbeat
/// loop, which is marked errored instead.
async fn finalize<S: Store>(
    store: &S,
    running: &RunningSet,
    metrics: &WorkerMetrics,
    name: &str,
    id: RecordId,
    cancel: &CancellationToken,
    result: Result<(), HandleError>,
) -> Result<(), FinalizeError> {
    match result {
        Ok(()) => {
            let marked = store
                .mark_complete(id)
                .await
                .map_err(|source| FinalizeError::MarkComplete { id, source })?;
            if marked {
                tracing::debug!(name = %name, record_id = %id, "marked record as complete");
            }
        }
        Err(error) if error.is_non_retryable() || (cancel.is_cancelled() && running.contains(id)) => {
            metrics.handler_failures.add(1, &[]);
            let marked = store
                .mark_failed(id, &error.to_string())
                .await
                .map_err(|source| FinalizeError::MarkFailed { id, source })?;
            if marked {
                tracing::warn!(name = %name, record_id = %id, error = %error, "marked record as failed");
            }
        }
        Err(error) => {
            metrics.handler_failures.add(1, &[]);
            let marked = store
                .mark_errored(id, &error.to_string())
                .await
                .map_err(|source| FinalizeError::MarkErrored { id, source })?;
            if marked {
                tracing::warn!(name = %name, record_id = %id, error = %error, "marked record as errored");
            }
        }
    }

    Ok(())
}

/// Periodically refreshes the claims on all in-flight records.
///
/// Reconciles the worker's belief of what it owns with the store's record
/// of what it owns: ids the store no longer recognizes are removed from
/// the running set so they stop being heartbeated. The loop never cancels
/// handlers; a record that lost its claim simply produces an outcome the
/// store will decline. Exits solely on root cancellation, even when the
/// dequeue loop has already stopped because of a configured cap.
async fn heartbeat_loop<S: Store>(
    store: Arc<S>,
    running: Arc<RunningSet>,
    interval: Duration,
    root: CancellationToken,
    name: String,
) {
    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = root.cancelled() => return,
        }

        let ids = running.ids();
        let known: HashSet<RecordId> = match store.heartbeat(&ids).await {
            Ok(known) => known.into_iter().collect(),
            Err(error) => {
                // Transient store failures do not tear down the worker.
                tracing::error!(
                    name = %name,
                    ?ids,
                    error = %error,
                    "failed to refresh heartbeats"
                );
                continue;
            }
        };

        for id in ids {
            if !known.contains(&id) {
                tracing::error!(
                    name = %name,
                    record_id = %id,
                    "removing record no longer claimed by this worker"
                );
                running.remove(id);
            }
        }
    }
}

/// Resolves when the optional deadline passes; pends forever without one.
async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
