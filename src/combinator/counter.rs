//! Countdown waiter shared by gather and the scopes.

use crate::cell::ResumeCell;
use crate::task::Stepper;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Records one completion: decrements the counter and resumes the waiter
/// when it reaches zero.
///
/// Completions beyond the target leave the counter at zero — the guard
/// against a racing double-resumption is that the counter never goes
/// negative and the cell is only ever delivered on the transition to
/// zero.
pub(crate) fn complete_one(count: &Cell<usize>, cell: &ResumeCell<()>) {
    let left = count.get();
    if left == 0 {
        return;
    }
    count.set(left - 1);
    if left == 1 {
        // The waiter may not have armed yet (a child completed inside
        // `start`); it re-checks the counter on its first poll.
        cell.try_deliver(());
    }
}

/// Future that completes when the shared counter reaches zero.
#[must_use = "futures do nothing unless awaited"]
pub(crate) struct CounterWait {
    count: Rc<Cell<usize>>,
    cell: ResumeCell<()>,
    armed: bool,
}

impl CounterWait {
    pub(crate) fn new(count: Rc<Cell<usize>>, cell: ResumeCell<()>) -> Self {
        Self {
            count,
            cell,
            armed: false,
        }
    }
}

impl Future for CounterWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.count.get() == 0 {
            let _ = this.cell.take();
            return Poll::Ready(());
        }
        if !this.armed {
            this.armed = true;
            this.cell.register(Stepper::current().into_hook());
        }
        Poll::Pending
    }
}

impl Drop for CounterWait {
    fn drop(&mut self) {
        // Completions arriving after the waiter is gone are dropped.
        self.cell.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::task::start;

    #[test]
    fn waits_until_the_counter_drains() {
        let count = Rc::new(Cell::new(2));
        let cell = ResumeCell::new();
        let task = start({
            let count = Rc::clone(&count);
            let cell = cell.clone();
            async move {
                CounterWait::new(count, cell).await;
                Ok::<_, Error>(())
            }
        });

        complete_one(&count, &cell);
        assert!(!task.is_terminal());
        complete_one(&count, &cell);
        assert!(task.is_done());
    }

    #[test]
    fn zero_target_completes_without_suspending() {
        let task = start(async {
            CounterWait::new(Rc::new(Cell::new(0)), ResumeCell::new()).await;
            Ok::<_, Error>(())
        });
        assert!(task.is_done());
    }

    #[test]
    fn excess_completions_never_underflow() {
        let count = Rc::new(Cell::new(1));
        let cell = ResumeCell::new();
        let task = start({
            let count = Rc::clone(&count);
            let cell = cell.clone();
            async move {
                CounterWait::new(count, cell).await;
                Ok::<_, Error>(())
            }
        });

        complete_one(&count, &cell);
        assert!(task.is_done());
        // Late completions find the counter at zero and do nothing.
        complete_one(&count, &cell);
        complete_one(&count, &cell);
        assert_eq!(count.get(), 0);
    }
}
