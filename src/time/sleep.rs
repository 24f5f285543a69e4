//! Sleep: suspend until a duration elapses on the host clock.

use super::{TimerGuard, TimerHost};
use crate::cell::ResumeCell;
use crate::task::Stepper;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Suspends the current task until `delay` has elapsed on `host`.
///
/// Registration happens when the returned future is first polled, not
/// when it is created. If the wait is cancelled, the pending timer is
/// cancelled on the host; a host that cannot cancel merely fires a
/// closed-cell delivery later, which is dropped (a bounded, documented
/// leak — never a stray resumption).
pub fn sleep<H: TimerHost>(host: H, delay: Duration) -> Sleep<H> {
    Sleep {
        host,
        delay,
        cell: ResumeCell::new(),
        guard: None,
        armed: false,
    }
}

/// Future returned by [`sleep`].
#[must_use = "futures do nothing unless awaited"]
pub struct Sleep<H: TimerHost> {
    host: H,
    delay: Duration,
    cell: ResumeCell<()>,
    guard: Option<TimerGuard<H>>,
    armed: bool,
}

impl<H: TimerHost> Future for Sleep<H> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.cell.take().is_some() {
            if let Some(guard) = this.guard.as_mut() {
                guard.disarm();
            }
            return Poll::Ready(());
        }
        if !this.armed {
            this.armed = true;
            this.cell.register(Stepper::current().into_hook());
            let cell = this.cell.clone();
            let id = this.host.after(
                this.delay,
                Box::new(move || {
                    cell.deliver(());
                }),
            );
            this.guard = Some(TimerGuard::new(this.host.clone(), id));
        }
        Poll::Pending
    }
}

impl<H: TimerHost> Drop for Sleep<H> {
    fn drop(&mut self) {
        // Deliveries from a timer the host could not cancel are dropped.
        self.cell.close();
    }
}
