//! Timer heap for deadline management.
//!
//! A min-heap of timer deadlines, generation-tiebroken so that timers
//! scheduled for the same deadline pop in registration order (FIFO).
//! Cancellation does not remove heap entries; cancelled generations are
//! simply absent from the callback table when they pop.

use crate::types::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A timer entry in the heap.
#[derive(Debug, Clone, Eq, PartialEq)]
struct TimerEntry {
    deadline: Time,
    /// Registration order; doubles as the timer id and the FIFO tiebreak.
    generation: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first, then
        // earliest registration).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of timers ordered by (deadline, registration order).
#[derive(Debug, Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a timer with the given deadline; returns its generation.
    pub(crate) fn insert(&mut self, deadline: Time) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry {
            deadline,
            generation,
        });
        generation
    }

    /// Pops the generations of all timers with `deadline <= now`, in
    /// (deadline, registration) order.
    pub(crate) fn pop_expired(&mut self, now: Time) -> Vec<u64> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline <= now {
                let entry = self.heap.pop().expect("peeked entry");
                expired.push(entry.generation);
            } else {
                break;
            }
        }
        expired
    }
}
