//! Handler contract invoked by the worker for each dequeued record.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{BoxError, store::Store};

/// Outcome of the optional pre-dequeue hook.
#[derive(Debug)]
pub enum PreDequeue<E> {
    /// Proceed with the dequeue, optionally threading extra arguments
    /// through to [`Store::dequeue`].
    ///
    /// [`Store::dequeue`]: crate::store::Store::dequeue
    Dequeue(Option<E>),
    /// Skip this dequeue without error; the worker waits its poll interval
    /// and consults the hook again.
    Skip,
}

/// Processes records dequeued by a [`Worker`].
///
/// [`Handler::handle`] is the only required method. The hooks have default
/// no-op implementations; a handler opts into them by overriding.
///
/// [`Worker`]: crate::worker::Worker
#[async_trait]
pub trait Handler<S: Store>: Send + Sync + 'static {
    /// Processes a single record.
    ///
    /// `cancel` is the record's own cancellation token. It fires when the
    /// worker shuts down or when [`Worker::cancel`] is invoked for this
    /// record; handlers that run for a long time should poll it or select
    /// against it and return [`HandleError::canceled`] once it fires.
    ///
    /// Returning `Ok(())` marks the record complete. See [`HandleError`]
    /// for how failures map to terminal states.
    ///
    /// [`Worker::cancel`]: crate::worker::Worker::cancel
    async fn handle(
        &self,
        cancel: &CancellationToken,
        record: &S::Record,
    ) -> Result<(), HandleError>;

    /// Consulted before every dequeue attempt.
    ///
    /// Returning [`PreDequeue::Skip`] skips the dequeue without error. An
    /// error is logged and the iteration continues; it never tears down the
    /// worker.
    async fn pre_dequeue(&self) -> Result<PreDequeue<S::Extra>, BoxError> {
        Ok(PreDequeue::Dequeue(None))
    }

    /// Invoked immediately before [`Handler::handle`], while the record is
    /// registered for heartbeats.
    async fn pre_handle(&self, record: &S::Record) {
        let _ = record;
    }

    /// Invoked after the record's terminal state has been reported.
    ///
    /// The record is no longer owned by this worker at this point, although
    /// it is still visible in the running set until the hook returns.
    async fn post_handle(&self, record: &S::Record) {
        let _ = record;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleErrorKind {
    Retryable,
    NonRetryable,
    Canceled,
}

/// A handler failure, classified by how the record should be finalized.
///
/// - [`HandleError::retryable`] marks the record errored; the store will
///   hand it out again later.
/// - [`HandleError::non_retryable`] marks the record failed.
/// - [`HandleError::canceled`] reports that the handler observed its
///   cancellation token fire; the fixed message becomes the failure text.
///
/// Cancellation does not depend on the handler choosing this variant: the
/// worker checks the record's token itself when the handler returns any
/// error, and a canceled record that is still registered is marked failed
/// regardless of the error the handler produced.
#[derive(Debug)]
pub struct HandleError {
    kind: HandleErrorKind,
    source: Option<BoxError>,
}

impl HandleError {
    /// A transient failure; the record will be retried.
    pub fn retryable(source: impl Into<BoxError>) -> Self {
        Self {
            kind: HandleErrorKind::Retryable,
            source: Some(source.into()),
        }
    }

    /// A permanent failure; the record will not be retried.
    pub fn non_retryable(source: impl Into<BoxError>) -> Self {
        Self {
            kind: HandleErrorKind::NonRetryable,
            source: Some(source.into()),
        }
    }

    /// The handler stopped because its cancellation token fired.
    #[must_use]
    pub fn canceled() -> Self {
        Self {
            kind: HandleErrorKind::Canceled,
            source: None,
        }
    }

    /// Returns `true` if this failure is flagged as non-retryable.
    #[must_use]
    pub fn is_non_retryable(&self) -> bool {
        self.kind == HandleErrorKind::NonRetryable
    }

    /// Returns `true` if the handler reported a cancellation.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.kind == HandleErrorKind::Canceled
    }
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (HandleErrorKind::Canceled, _) => f.write_str("handler canceled"),
            (_, Some(source)) => source.fmt(f),
            // Unreachable through the constructors, but Display must total.
            (_, None) => f.write_str("handler failed"),
        }
    }
}

impl std::error::Error for HandleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
