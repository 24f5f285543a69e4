//! Scoped waiter for high-frequency events.

use super::wait::EventFilter;
use super::{BindGuard, EventSource};
use crate::cell::ResumeCell;
use crate::error::Error;
use crate::task::Stepper;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A scoped event waiter that binds its handler once.
///
/// For sources that fire at high rate (pointer motion), a fresh
/// [`event`](super::event) per occurrence pays bind/unbind each time.
/// An `EventStream` attaches one handler for its whole lifetime and
/// hands out per-occurrence waits through [`next`](Self::next):
///
/// ```
/// # use taskweave::{event, start, Error};
/// # use taskweave::event::EventStream;
/// # use taskweave::sim::SimSource;
/// # let source: SimSource<(i32, i32)> = SimSource::new();
/// # let task = start({ let source = source.clone(); async move {
/// let _press = event(&source, "press").await?;
/// let mut motion = EventStream::open(&source, "motion");
/// let first = motion.next().await?;
/// let second = motion.next().await?;
/// # let _ = (first, second);
/// # Ok::<_, Error>(()) }});
/// # source.emit("press", (0, 0));
/// # source.emit("motion", (1, 1));
/// # source.emit("motion", (2, 2));
/// # assert!(task.is_done());
/// ```
///
/// Occurrences that arrive while no wait is outstanding are dropped —
/// that is the point: the scope only ever cares about the *next* one.
/// Only one wait may be outstanding at a time; `next` takes `&mut self`,
/// so a second concurrent wait is unrepresentable. The handler is
/// detached exactly once, when the stream is dropped.
#[must_use = "an event stream does nothing until `next` is awaited"]
pub struct EventStream<'a, S: EventSource> {
    cell: ResumeCell<Result<S::Event, Error>>,
    // Held for its Drop: detaches the handler on scope exit.
    _guard: BindGuard<'a, S>,
}

impl<'a, S: EventSource> EventStream<'a, S> {
    /// Binds to the named event on `source` for the lifetime of the
    /// stream.
    pub fn open(source: &'a S, name: &'a str) -> Self {
        Self::bind(source, name, None)
    }

    /// Like [`open`](Self::open), with a payload filter. Payloads the
    /// filter rejects do not complete a wait; a failing filter delivers
    /// its error to the outstanding wait, if any.
    pub fn open_where<F>(source: &'a S, name: &'a str, filter: F) -> Self
    where
        F: FnMut(&S::Event) -> Result<bool, Error> + 'static,
    {
        Self::bind(source, name, Some(Box::new(filter)))
    }

    fn bind(source: &'a S, name: &'a str, mut filter: Option<EventFilter<S::Event>>) -> Self {
        let cell: ResumeCell<Result<S::Event, Error>> = ResumeCell::new();
        let handler_cell = cell.clone();
        let id = source.bind(
            name,
            Box::new(move |payload: &S::Event| {
                let verdict = filter.as_mut().map_or(Ok(true), |f| f(payload));
                match verdict {
                    // No waiter between waits: the occurrence is dropped.
                    Ok(true) => {
                        handler_cell.try_deliver(Ok(payload.clone()));
                    }
                    Ok(false) => {}
                    Err(err) => {
                        handler_cell.try_deliver(Err(err));
                    }
                }
            }),
        );
        Self {
            cell,
            _guard: BindGuard::new(source, name, id),
        }
    }

    /// Waits for the next occurrence.
    ///
    /// The `&mut` borrow enforces the scope's contract: at most one
    /// outstanding wait at a time.
    pub fn next(&mut self) -> NextEvent<'_, S::Event> {
        NextEvent {
            cell: self.cell.clone(),
            armed: false,
            _scope: PhantomData,
        }
    }
}

impl<S: EventSource> Drop for EventStream<'_, S> {
    fn drop(&mut self) {
        // Close before `_guard` unbinds, for a dispatch already in flight.
        self.cell.close();
    }
}

/// Future returned by [`EventStream::next`].
#[must_use = "futures do nothing unless awaited"]
pub struct NextEvent<'n, E> {
    cell: ResumeCell<Result<E, Error>>,
    armed: bool,
    _scope: PhantomData<&'n mut ()>,
}

impl<E> Future for NextEvent<'_, E> {
    type Output = Result<E, Error>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(delivered) = this.cell.take() {
            return Poll::Ready(delivered);
        }
        if !this.armed {
            this.armed = true;
            this.cell.register(Stepper::current().into_hook());
        }
        Poll::Pending
    }
}

impl<E> Drop for NextEvent<'_, E> {
    fn drop(&mut self) {
        // An abandoned wait must not leave a stale waiter armed; the
        // stream itself stays usable.
        self.cell.disarm();
    }
}
