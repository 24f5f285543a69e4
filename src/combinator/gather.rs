//! Gather: start many computations, wait for `n` completions.

use super::{complete_one, CounterWait};
use crate::cell::ResumeCell;
use crate::error::Error;
use crate::task::{start, TaskHandle};
use crate::types::{CancelReason, Outcome};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// A boxed suspendable computation, as consumed by the combinators.
pub type Computation<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + 'static>>;

/// Boxes a computation for use with [`gather`], [`and_`] or [`or_`].
pub fn computation<T, F>(future: F) -> Computation<T>
where
    F: Future<Output = Result<T, Error>> + 'static,
{
    Box::pin(future)
}

/// Starts every computation as an independent task and suspends until
/// `quota` of them have completed (`None` means all of them).
///
/// Returns the handles of every started task, in input order — including
/// the ones still running when the quota was met. Gather does **not**
/// cancel the rest; whether to let them finish, keep their handles, or
/// cancel them is the caller's contract. Completion order among the
/// children is whatever order their callbacks fire in; nothing here
/// reorders them.
///
/// A child that errors or is cancelled still counts as completed for the
/// quota — terminal is terminal.
pub async fn gather<T: 'static>(
    computations: impl IntoIterator<Item = Computation<T>>,
    quota: Option<usize>,
) -> Vec<TaskHandle<T>> {
    let computations: Vec<Computation<T>> = computations.into_iter().collect();
    let total = computations.len();
    let quota = quota.unwrap_or(total).min(total);

    let remaining = Rc::new(Cell::new(quota));
    let cell: ResumeCell<()> = ResumeCell::new();

    let handles: Vec<TaskHandle<T>> = computations
        .into_iter()
        .map(|comp| {
            let handle = start(comp);
            let remaining = Rc::clone(&remaining);
            let cell = cell.clone();
            // Fires immediately for a child that completed inside `start`.
            handle.on_done(move || complete_one(&remaining, &cell));
            handle
        })
        .collect();

    CounterWait::new(remaining, cell).await;
    handles
}

/// Waits until the first of the given computations completes.
///
/// Equivalent to `gather(.., Some(1))`: the remaining tasks are left
/// running and their handles are returned alongside the finished one.
pub async fn or_<T: 'static>(
    computations: impl IntoIterator<Item = Computation<T>>,
) -> Vec<TaskHandle<T>> {
    gather(computations, Some(1)).await
}

/// Waits until every given computation completes, then aggregates.
///
/// All children run to a terminal state before this returns — an early
/// error does not cancel the siblings. The aggregate follows the
/// severity lattice `Ok < Err < Cancelled`: all-ok yields the values in
/// input order, otherwise the worst outcome wins, with the first error
/// in input order breaking ties among errors and cancel reasons
/// strengthened among cancellations.
pub async fn and_<T: 'static>(
    computations: impl IntoIterator<Item = Computation<T>>,
) -> Outcome<Vec<T>> {
    let handles = gather(computations, None).await;
    aggregate(&handles)
}

fn aggregate<T>(handles: &[TaskHandle<T>]) -> Outcome<Vec<T>> {
    let mut values = Vec::with_capacity(handles.len());
    let mut first_error: Option<Error> = None;
    let mut strongest_cancel: Option<CancelReason> = None;

    for handle in handles {
        match handle.take_outcome() {
            Some(Outcome::Ok(value)) => values.push(value),
            Some(Outcome::Err(error)) => {
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            Some(Outcome::Cancelled(reason)) => match &mut strongest_cancel {
                None => strongest_cancel = Some(reason),
                Some(existing) => {
                    existing.strengthen(&reason);
                }
            },
            None => unreachable!("gather over all children returns only terminal tasks"),
        }
    }

    if let Some(reason) = strongest_cancel {
        Outcome::Cancelled(reason)
    } else if let Some(error) = first_error {
        Outcome::Err(error)
    } else {
        Outcome::Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TickClock;
    use std::time::Duration;

    fn sleepy(clock: &TickClock, ms: u64, value: u32) -> Computation<u32> {
        let clock = clock.clone();
        computation(async move {
            clock.sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
    }

    #[test]
    fn gather_all_waits_for_every_child() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                let handles = gather([sleepy(&clock, 10, 1), sleepy(&clock, 20, 2)], None).await;
                let sum: u32 = handles
                    .iter()
                    .map(|h| h.take_outcome().unwrap().ok().unwrap())
                    .sum();
                Ok::<_, Error>(sum)
            }
        });

        clock.tick(Duration::from_millis(10));
        assert!(!task.is_terminal());
        clock.tick(Duration::from_millis(10));
        assert_eq!(task.take_outcome().unwrap().ok(), Some(3));
    }

    #[test]
    fn gather_quota_resumes_early_and_leaves_the_rest_running() {
        let clock = TickClock::new();
        let handles_out = Rc::new(std::cell::RefCell::new(Vec::new()));
        let task = start({
            let clock = clock.clone();
            let handles_out = Rc::clone(&handles_out);
            async move {
                let handles = gather([sleepy(&clock, 10, 1), sleepy(&clock, 20, 2)], Some(1)).await;
                *handles_out.borrow_mut() = handles;
                Ok::<_, Error>(())
            }
        });

        clock.tick(Duration::from_millis(10));
        // The 10ms child finished and the gather resumed...
        assert!(task.is_done());
        let handles = handles_out.borrow();
        assert!(handles[0].is_done());
        // ...while the 20ms child is still running, uncancelled.
        assert!(!handles[1].is_terminal());

        clock.tick(Duration::from_millis(10));
        assert!(handles[1].is_done());
    }

    #[test]
    fn gather_of_nothing_completes_immediately() {
        let task = start(async {
            let handles = gather(Vec::<Computation<u32>>::new(), None).await;
            Ok::<_, Error>(handles.len())
        });
        assert_eq!(task.take_outcome().unwrap().ok(), Some(0));
    }

    #[test]
    fn gather_with_already_complete_children_does_not_hang() {
        let task = start(async {
            let handles = gather(
                [
                    computation(async { Ok(1u32) }),
                    computation(async { Ok(2u32) }),
                ],
                None,
            )
            .await;
            Ok::<_, Error>(handles.len())
        });
        assert_eq!(task.take_outcome().unwrap().ok(), Some(2));
    }

    #[test]
    fn and_collects_values_in_input_order() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                // Completion order (20ms then 10ms) must not leak into
                // the value order.
                let out = and_([sleepy(&clock, 20, 1), sleepy(&clock, 10, 2)]).await;
                Ok::<_, Error>(out.ok().unwrap())
            }
        });
        clock.tick(Duration::from_millis(20));
        assert_eq!(task.take_outcome().unwrap().ok(), Some(vec![1, 2]));
    }

    #[test]
    fn and_surfaces_the_first_error_after_all_complete() {
        let clock = TickClock::new();
        let sibling_done = Rc::new(Cell::new(false));
        let task = start({
            let clock = clock.clone();
            let sibling_done = Rc::clone(&sibling_done);
            async move {
                let failing = computation(async { Err::<u32, _>(Error::app("early failure")) });
                let slow = {
                    let clock = clock.clone();
                    let sibling_done = Rc::clone(&sibling_done);
                    computation(async move {
                        clock.sleep(Duration::from_millis(10)).await;
                        sibling_done.set(true);
                        Ok(7u32)
                    })
                };
                let out = and_([failing, slow]).await;
                match out {
                    Outcome::Err(err) => Ok::<_, Error>(err.message().unwrap_or("").to_owned()),
                    other => panic!("expected error outcome, got {other}"),
                }
            }
        });

        // The failing child completed at once, but and_ keeps waiting:
        // the sibling is not cancelled by the combinator.
        assert!(!task.is_terminal());
        assert!(!sibling_done.get());

        clock.tick(Duration::from_millis(10));
        assert!(sibling_done.get());
        assert_eq!(
            task.take_outcome().unwrap().ok().as_deref(),
            Some("early failure")
        );
    }

    #[test]
    fn or_is_gather_with_quota_one() {
        let clock = TickClock::new();
        let task = start({
            let clock = clock.clone();
            async move {
                let handles = or_([sleepy(&clock, 10, 1), sleepy(&clock, 20, 2)]).await;
                let done = handles.iter().filter(|h| h.is_done()).count();
                Ok::<_, Error>(done)
            }
        });
        clock.tick(Duration::from_millis(10));
        assert_eq!(task.take_outcome().unwrap().ok(), Some(1));
    }

    #[test]
    fn aggregate_prefers_cancellation_over_error() {
        let clock = TickClock::new();
        let ok = start(async { Ok(1u32) });
        let err = start(async { Err::<u32, _>(Error::app("x")) });
        let cancelled = start({
            let clock = clock.clone();
            async move {
                clock.sleep(Duration::from_secs(1)).await;
                Ok(2u32)
            }
        });
        cancelled.cancel();

        let out = aggregate(&[ok, err, cancelled]);
        assert!(out.is_cancelled());
    }

    #[test]
    fn aggregate_surfaces_the_first_error_in_input_order() {
        let a = start(async { Err::<u32, _>(Error::app("first")) });
        let b = start(async { Err::<u32, _>(Error::app("second")) });
        match aggregate(&[a, b]) {
            Outcome::Err(err) => assert_eq!(err.message(), Some("first")),
            other => panic!("expected error outcome, got {other}"),
        }
    }
}
