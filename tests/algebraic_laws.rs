//! Property tests for the small algebras the scheduler leans on:
//! cancel-reason strengthening and timer firing order.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use taskweave::time::TickClock;
use taskweave::{CancelKind, CancelReason};

fn arb_kind() -> impl Strategy<Value = CancelKind> {
    prop_oneof![
        Just(CancelKind::User),
        Just(CancelKind::Timeout),
        Just(CancelKind::TriggerFired),
        Just(CancelKind::ScopeClosed),
        Just(CancelKind::Shutdown),
    ]
}

fn arb_reason() -> impl Strategy<Value = CancelReason> {
    (arb_kind(), prop_oneof![Just(None), Just(Some("a")), Just(Some("b"))]).prop_map(
        |(kind, message)| {
            let mut reason = CancelReason::new(kind);
            reason.message = message;
            reason
        },
    )
}

fn combine(mut a: CancelReason, b: &CancelReason) -> CancelReason {
    a.strengthen(b);
    a
}

proptest! {
    #[test]
    fn strengthen_never_lowers_severity(a in arb_reason(), b in arb_reason()) {
        let before = a.kind.severity();
        let after = combine(a, &b).kind.severity();
        prop_assert!(after >= before);
        prop_assert!(after >= b.kind.severity());
    }

    #[test]
    fn strengthen_is_idempotent(a in arb_reason(), b in arb_reason()) {
        let once = combine(a.clone(), &b);
        let twice = combine(once.clone(), &b);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn strengthen_is_associative(
        a in arb_reason(),
        b in arb_reason(),
        c in arb_reason(),
    ) {
        let left = combine(combine(a.clone(), &b), &c);
        let right = combine(a, &combine(b, &c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn strengthen_is_commutative(a in arb_reason(), b in arb_reason()) {
        let ab = combine(a.clone(), &b);
        let ba = combine(b, &a);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn timers_fire_in_deadline_then_registration_order(
        delays in proptest::collection::vec(0_u64..50, 1..20),
    ) {
        let clock = TickClock::new();
        let fired: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

        for (index, delay) in delays.iter().enumerate() {
            let fired = Rc::clone(&fired);
            use taskweave::time::TimerHost;
            clock.after(
                Duration::from_millis(*delay),
                Box::new(move || fired.borrow_mut().push(index)),
            );
        }
        clock.tick(Duration::from_millis(50));

        // Expected: stable sort by deadline, i.e. (delay, registration).
        let mut expected: Vec<usize> = (0..delays.len()).collect();
        expected.sort_by_key(|&i| delays[i]);
        prop_assert_eq!(&*fired.borrow(), &expected);
    }
}
