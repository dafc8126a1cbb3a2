//! Transition table, exhaustively and under proptest.

use std::sync::Arc;

use proptest::prelude::*;

use crate::state::ServiceState::{
    Active, Disposed, FailStart, NotStarted, ShuttingDown, Starting, Stopped,
};
use crate::state::{ServiceState, StateMachine, Transition};

/// Independent rendering of the legal edges.
fn legal(from: ServiceState, to: ServiceState) -> bool {
    matches!(
        (from, to),
        (NotStarted, Starting)
            | (Starting, Active | ShuttingDown | Stopped | FailStart)
            | (Active, ShuttingDown | Stopped)
            | (ShuttingDown, Stopped)
    ) || (from != Disposed && to == Disposed)
}

/// Drives a fresh machine into `state` along legal edges.
fn machine_in(state: ServiceState) -> StateMachine {
    let path: &[ServiceState] = match state {
        NotStarted => &[],
        Starting => &[Starting],
        Active => &[Starting, Active],
        ShuttingDown => &[Starting, Active, ShuttingDown],
        Stopped => &[Starting, Active, ShuttingDown, Stopped],
        Disposed => &[Disposed],
        FailStart => &[Starting, FailStart],
    };
    let machine = StateMachine::new("table");
    for step in path {
        assert!(machine.request(*step).is_applied());
    }
    assert_eq!(machine.current(), state);
    machine
}

#[test]
fn every_pair_matches_table() {
    for from in ServiceState::ALL {
        for to in ServiceState::ALL {
            let machine = machine_in(from);
            let outcome = machine.request(to);

            if from == to {
                assert_eq!(outcome, Transition::Unchanged(from));
                assert_eq!(machine.current(), from);
            } else if legal(from, to) {
                assert_eq!(outcome, Transition::Applied { from, to }, "{from} -> {to}");
                assert_eq!(machine.current(), to);
            } else {
                assert_eq!(outcome, Transition::Rejected { from, to }, "{from} -> {to}");
                assert_eq!(machine.current(), from);
            }
            assert_eq!(from.can_transition_to(to), legal(from, to));
        }
    }
}

#[test]
fn no_state_re_enters_not_started() {
    for from in ServiceState::ALL {
        assert!(!from.can_transition_to(NotStarted));
    }
}

#[test]
fn concurrent_requests_always_end_disposed() {
    for _ in 0..100 {
        let machine = Arc::new(machine_in(Active));

        let handles: Vec<_> = [Stopped, Disposed, ShuttingDown, Stopped]
            .into_iter()
            .map(|target| {
                let machine = Arc::clone(&machine);
                std::thread::spawn(move || machine.request(target))
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Every applied edge must have been legal from its recorded origin.
        for outcome in &outcomes {
            if let Transition::Applied { from, to } = *outcome {
                assert!(legal(from, to), "{from} -> {to}");
            }
        }
        let disposals = outcomes
            .iter()
            .filter(|o| matches!(o, Transition::Applied { to: Disposed, .. }))
            .count();
        assert_eq!(disposals, 1);
        assert_eq!(machine.current(), Disposed);
    }
}

fn any_state() -> impl Strategy<Value = ServiceState> {
    prop::sample::select(ServiceState::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_random_requests_follow_table(
        requests in prop::collection::vec(any_state(), 0..40)
    ) {
        let machine = StateMachine::new("prop");
        let mut expected = NotStarted;

        for target in requests {
            let outcome = machine.request(target);
            if target != expected && legal(expected, target) {
                prop_assert_eq!(outcome, Transition::Applied { from: expected, to: target });
                expected = target;
            } else {
                prop_assert!(!outcome.is_applied());
            }
            prop_assert_eq!(machine.current(), expected);
        }
    }

    #[test]
    fn prop_disposed_absorbs_everything(
        requests in prop::collection::vec(any_state(), 0..20)
    ) {
        let machine = machine_in(Disposed);
        for target in requests {
            machine.request(target);
            prop_assert_eq!(machine.current(), Disposed);
        }
    }

    #[test]
    fn prop_active_is_never_re_entered(
        requests in prop::collection::vec(any_state(), 0..40)
    ) {
        let machine = StateMachine::new("prop");
        let mut left_active = false;

        for target in requests {
            let before = machine.current();
            machine.request(target);
            let after = machine.current();
            if before == Active && after != Active {
                left_active = true;
            }
            prop_assert!(!(left_active && after.is_active()));
        }
    }
}
