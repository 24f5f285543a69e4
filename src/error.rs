//! Error types and error handling strategy.
//!
//! Errors here are the *application-level* failures a task can complete
//! with. They compose with the outcome lattice (`Ok < Err < Cancelled`).
//!
//! Two things are deliberately **not** errors:
//!
//! - Protocol violations (double resumption, delivering to an unarmed
//!   resumption cell, redelivery) panic immediately — they indicate
//!   scheduler corruption and must never be tolerated or retried.
//! - Cancellation is its own terminal signal. [`ErrorKind::Cancelled`]
//!   exists only so cancellation can travel through `Result` call chains
//!   (e.g. a child awaiting another child) without losing its identity.

use crate::types::CancelReason;
use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An application-level failure raised by a computation.
    App,
    /// The awaited operation was cancelled.
    Cancelled,
    /// A worker closure panicked; the payload is carried in the message.
    WorkerPanicked,
    /// The worker pool rejected a job because it is shutting down.
    PoolShutDown,
    /// The filter of an event waiter failed.
    FilterFailed,
}

impl ErrorKind {
    /// Returns a short static name for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Cancelled => "cancelled",
            Self::WorkerPanicked => "worker panicked",
            Self::PoolShutDown => "pool shut down",
            Self::FilterFailed => "filter failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error type carried by task outcomes.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    cancel_reason: Option<CancelReason>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates an error of the given kind with no message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            cancel_reason: None,
            source: None,
        }
    }

    /// Creates an application error with a message.
    #[must_use]
    pub fn app(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::App).with_message(message)
    }

    /// Wraps an arbitrary error value as an application error.
    #[must_use]
    pub fn wrap<E: std::error::Error + Send + Sync + 'static>(source: E) -> Self {
        let mut err = Self::app(source.to_string());
        err.source = Some(Arc::new(source));
        err
    }

    /// Creates an error recording that the awaited operation was cancelled.
    #[must_use]
    pub fn cancelled(reason: CancelReason) -> Self {
        let mut err = Self::new(ErrorKind::Cancelled);
        err.cancel_reason = Some(reason);
        err
    }

    /// Creates an error capturing a worker panic payload.
    #[must_use]
    pub fn worker_panicked(payload: impl Into<String>) -> Self {
        Self::new(ErrorKind::WorkerPanicked).with_message(payload)
    }

    /// Creates an error for an event filter failure.
    #[must_use]
    pub fn filter_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FilterFailed).with_message(message)
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the cancel reason if this error records a cancellation.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }

    /// Returns true if this error records a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(reason) = &self.cancel_reason {
            write!(f, " ({reason})")?;
        }
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error returned when submitting a job to a worker pool fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The pool has been shut down and accepts no further jobs.
    #[error("worker pool has shut down")]
    ShutDown,
}

impl From<SubmitError> for Error {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ShutDown => Self::new(ErrorKind::PoolShutDown),
        }
    }
}
