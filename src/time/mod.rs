//! Timer capability and time-based suspension.
//!
//! The host loop owns real time. This module defines the capability the
//! core needs from it — [`TimerHost`]: schedule a one-shot callback,
//! cancel it by id — plus [`TickClock`], a ready-made implementation fed
//! by the host loop's elapsed-time delta, and [`sleep`], the suspension
//! primitive built on top.
//!
//! Precision is bounded by the host loop's tick interval; there is no
//! independent timer thread.

mod clock;
mod heap;
mod sleep;

pub use clock::TickClock;
pub use sleep::{sleep, Sleep};

use std::time::Duration;

/// Identifier of a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Creates a timer id from its raw value. For adapter implementors.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Capability trait for the host's timer facility.
///
/// `after` schedules `callback` to run once, no earlier than `delay` from
/// now; `cancel` revokes a scheduled callback by id. Cancelling an id that
/// already fired (or was already cancelled) must be a no-op.
///
/// Implementations are handles: plain data, cheap to clone, with every
/// clone viewing the same underlying timer queue — suspension primitives
/// capture their own clone.
pub trait TimerHost: Clone + Unpin + 'static {
    /// Schedules a one-shot callback.
    fn after(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a scheduled callback. No-op if it already fired.
    fn cancel(&self, id: TimerId);
}

/// Cancels a scheduled timer when dropped, unless disarmed.
pub(crate) struct TimerGuard<H: TimerHost> {
    host: H,
    id: Option<TimerId>,
}

impl<H: TimerHost> TimerGuard<H> {
    pub(crate) fn new(host: H, id: TimerId) -> Self {
        Self { host, id: Some(id) }
    }

    /// The timer fired; nothing left to cancel.
    pub(crate) fn disarm(&mut self) {
        self.id = None;
    }
}

impl<H: TimerHost> Drop for TimerGuard<H> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.host.cancel(id);
        }
    }
}
