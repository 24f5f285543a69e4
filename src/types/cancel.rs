//! Cancellation reason and kind types.
//!
//! Cancellation is a first-class terminal signal, distinct from both normal
//! completion and error. This module defines the types that describe why a
//! task was cancelled.

use core::fmt;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit cancellation requested by application code.
    User,
    /// Cancellation because a scope's timeout elapsed.
    Timeout,
    /// Cancellation because a scope's trigger computation finished first.
    TriggerFired,
    /// Cancellation because the owning scope or nursery is closing.
    ScopeClosed,
    /// Cancellation because the host loop is shutting down.
    Shutdown,
}

impl CancelKind {
    /// Returns the severity of this cancellation kind.
    ///
    /// Higher severity kinds win when two reasons are combined.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Timeout => 1,
            Self::TriggerFired => 2,
            Self::ScopeClosed => 3,
            Self::Shutdown => 4,
        }
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Timeout => write!(f, "timeout"),
            Self::TriggerFired => write!(f, "trigger fired"),
            Self::ScopeClosed => write!(f, "scope closed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation: a kind plus an optional static message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message (static for determinism).
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a timeout cancellation reason.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(CancelKind::Timeout)
    }

    /// Creates a trigger-fired cancellation reason.
    ///
    /// Used when a scope body is cancelled because the scope's trigger
    /// computation completed first.
    #[must_use]
    pub const fn trigger_fired() -> Self {
        Self::new(CancelKind::TriggerFired)
    }

    /// Creates a scope-closed cancellation reason.
    #[must_use]
    pub const fn scope_closed() -> Self {
        Self::new(CancelKind::ScopeClosed)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }

    /// Strengthens this reason with another, keeping the more severe one.
    ///
    /// Returns `true` if the reason was changed.
    pub fn strengthen(&mut self, other: &Self) -> bool {
        if other.kind > self.kind {
            self.kind = other.kind;
            self.message = other.message;
            return true;
        }

        if other.kind < self.kind {
            return false;
        }

        match (self.message, other.message) {
            (None, Some(msg)) => {
                self.message = Some(msg);
                true
            }
            (Some(current), Some(candidate)) if candidate < current => {
                self.message = Some(candidate);
                true
            }
            _ => false,
        }
    }

    /// Returns the kind of this cancellation reason.
    #[must_use]
    pub const fn kind(&self) -> CancelKind {
        self.kind
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(CancelKind::User.severity() < CancelKind::Timeout.severity());
        assert!(CancelKind::Timeout.severity() < CancelKind::TriggerFired.severity());
        assert!(CancelKind::TriggerFired.severity() < CancelKind::ScopeClosed.severity());
        assert!(CancelKind::ScopeClosed.severity() < CancelKind::Shutdown.severity());
    }

    #[test]
    fn strengthen_takes_more_severe() {
        let mut reason = CancelReason::new(CancelKind::User);
        assert!(reason.strengthen(&CancelReason::timeout()));
        assert_eq!(reason.kind, CancelKind::Timeout);

        assert!(reason.strengthen(&CancelReason::shutdown()));
        assert_eq!(reason.kind, CancelKind::Shutdown);

        // Less severe should not change.
        assert!(!reason.strengthen(&CancelReason::timeout()));
        assert_eq!(reason.kind, CancelKind::Shutdown);
    }

    #[test]
    fn strengthen_is_idempotent() {
        let mut reason = CancelReason::timeout();
        assert!(!reason.strengthen(&CancelReason::timeout()));
        assert_eq!(reason.kind, CancelKind::Timeout);
    }

    #[test]
    fn strengthen_same_kind_picks_deterministic_message() {
        let mut reason = CancelReason::user("b");
        assert!(reason.strengthen(&CancelReason::user("a")));
        assert_eq!(reason.message, Some("a"));
    }

    #[test]
    fn strengthen_resets_message_when_kind_increases() {
        let mut reason = CancelReason::user("please stop");
        assert!(reason.strengthen(&CancelReason::scope_closed()));
        assert_eq!(reason.kind, CancelKind::ScopeClosed);
        assert_eq!(reason.message, None);
    }
}
