//! Three-valued outcome type with severity lattice.
//!
//! The outcome type represents the terminal state of a task:
//!
//! - `Ok(T)`: completed with a value
//! - `Err(Error)`: completed with an application error
//! - `Cancelled(CancelReason)`: cancelled before completion
//!
//! These form a severity lattice: `Ok < Err < Cancelled`. When combinators
//! aggregate the outcomes of several tasks, the worst outcome wins.
//!
//! Protocol violations are not outcomes: they panic (see [`crate::cell`]).

use super::cancel::CancelReason;
use crate::error::Error;
use core::fmt;

/// The terminal outcome of a task.
///
/// Forms a severity lattice where worse outcomes dominate:
/// `Ok < Err < Cancelled`.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The task completed with a value.
    Ok(T),
    /// The task completed with an application error.
    Err(Error),
    /// The task was cancelled.
    Cancelled(CancelReason),
}

impl<T> Outcome<T> {
    /// Returns the severity level of this outcome (0 = Ok, 2 = Cancelled).
    #[must_use]
    pub const fn severity(&self) -> u8 {
        match self {
            Self::Ok(_) => 0,
            Self::Err(_) => 1,
            Self::Cancelled(_) => 2,
        }
    }

    /// Returns true if this outcome is `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if this outcome is `Err`.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the success value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Converts into a `Result`, mapping cancellation to
    /// [`ErrorKind::Cancelled`](crate::ErrorKind::Cancelled).
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Err(e) => Err(e),
            Self::Cancelled(reason) => Err(Error::cancelled(reason)),
        }
    }

    /// Maps the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Err(e) => Outcome::Err(e),
            Self::Cancelled(r) => Outcome::Cancelled(r),
        }
    }

    /// Builds an outcome from a computation's `Result`.
    pub fn from_result(result: Result<T, Error>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err(e),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(v) => write!(f, "ok: {v:?}"),
            Self::Err(e) => write!(f, "err: {e}"),
            Self::Cancelled(r) => write!(f, "cancelled: {r}"),
        }
    }
}
