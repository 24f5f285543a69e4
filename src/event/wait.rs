//! One-shot event waiters.

use super::{BindGuard, EventSource};
use crate::cell::ResumeCell;
use crate::error::Error;
use crate::task::Stepper;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Filter evaluated against each occurrence's payload.
pub(crate) type EventFilter<E> = Box<dyn FnMut(&E) -> Result<bool, Error>>;

/// Suspends the current task until the named event fires on `source`.
///
/// The handler is attached when the future is first polled and detached
/// when the future is dropped — on delivery, on cancellation, and on
/// error alike. The source's handler count returns to its prior value by
/// the time the await expression finishes.
pub fn event<'a, S: EventSource>(source: &'a S, name: &'a str) -> EventWait<'a, S> {
    EventWait {
        source,
        name,
        cell: ResumeCell::new(),
        guard: None,
        filter: None,
        armed: false,
    }
}

/// Like [`event`], but only payloads for which `filter` returns
/// `Ok(true)` complete the wait; others are ignored and the wait
/// continues.
///
/// If the filter fails, its error is delivered to the waiting task — and
/// the handler is still detached.
pub fn event_where<'a, S, F>(source: &'a S, name: &'a str, filter: F) -> EventWait<'a, S>
where
    S: EventSource,
    F: FnMut(&S::Event) -> Result<bool, Error> + 'static,
{
    EventWait {
        source,
        name,
        cell: ResumeCell::new(),
        guard: None,
        filter: Some(Box::new(filter)),
        armed: false,
    }
}

/// Future returned by [`event`] and [`event_where`].
#[must_use = "futures do nothing unless awaited"]
pub struct EventWait<'a, S: EventSource> {
    source: &'a S,
    name: &'a str,
    cell: ResumeCell<Result<S::Event, Error>>,
    guard: Option<BindGuard<'a, S>>,
    filter: Option<EventFilter<S::Event>>,
    armed: bool,
}

impl<S: EventSource> Future for EventWait<'_, S> {
    type Output = Result<S::Event, Error>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(delivered) = this.cell.take() {
            return Poll::Ready(delivered);
        }
        if !this.armed {
            this.armed = true;
            this.cell.register(Stepper::current().into_hook());
            let cell = this.cell.clone();
            let mut filter = this.filter.take();
            let id = this.source.bind(
                this.name,
                Box::new(move |payload: &S::Event| {
                    let verdict = filter.as_mut().map_or(Ok(true), |f| f(payload));
                    match verdict {
                        Ok(true) => {
                            cell.try_deliver(Ok(payload.clone()));
                        }
                        Ok(false) => {}
                        Err(err) => {
                            cell.try_deliver(Err(err));
                        }
                    }
                }),
            );
            this.guard = Some(BindGuard::new(this.source, this.name, id));
        }
        Poll::Pending
    }
}

impl<S: EventSource> Drop for EventWait<'_, S> {
    fn drop(&mut self) {
        // Close before the guard unbinds: a dispatch already in flight
        // must find a dead cell, not a dangling waiter.
        self.cell.close();
    }
}
