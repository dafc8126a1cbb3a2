//! Lifecycle state machine for a hosted service.
//!
//! Transitions follow a strict directed graph:
//! ```text
//! NotStarted → Starting → Active → ShuttingDown → Stopped → Disposed
//!                 │  ╰────────────────────────────↗    ↑
//!                 ↓                                    │
//!             FailStart ───────────────────────────────╯
//! ```
//! Every state except `Disposed` may move straight to `Disposed`.
//! Requests outside the graph leave the state untouched and never fail.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    /// Constructed, `run` has not been entered.
    NotStarted,
    /// Startup logic is executing; not yet open for business.
    Starting,
    /// Open for business; the work loop is running.
    Active,
    /// Told to shut down; no longer open for business.
    ShuttingDown,
    /// Stopped, waiting to be disposed.
    Stopped,
    /// Disposed. Terminal.
    Disposed,
    /// Startup failed. Only disposal remains.
    FailStart,
}

impl ServiceState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::NotStarted,
        Self::Starting,
        Self::Active,
        Self::ShuttingDown,
        Self::Stopped,
        Self::Disposed,
        Self::FailStart,
    ];

    /// Returns the states reachable in a single transition.
    #[must_use]
    pub const fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::NotStarted => &[Self::Starting, Self::Disposed],
            Self::Starting => &[
                Self::Active,
                Self::ShuttingDown,
                Self::Stopped,
                Self::Disposed,
                Self::FailStart,
            ],
            Self::Active => &[Self::ShuttingDown, Self::Stopped, Self::Disposed],
            Self::ShuttingDown => &[Self::Stopped, Self::Disposed],
            Self::Stopped | Self::FailStart => &[Self::Disposed],
            Self::Disposed => &[],
        }
    }

    /// Returns true if `target` is reachable in a single transition.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.allowed_next().contains(&target)
    }

    /// Returns true only while the service is open for business.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::ShuttingDown => "shutting-down",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
            Self::FailStart => "fail-start",
        };
        f.write_str(name)
    }
}

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state moved.
    Applied {
        /// State before the request.
        from: ServiceState,
        /// State after the request.
        to: ServiceState,
    },
    /// Already in the requested state.
    Unchanged(ServiceState),
    /// Not reachable from the current state; nothing changed.
    Rejected {
        /// Current (and retained) state.
        from: ServiceState,
        /// Requested state.
        to: ServiceState,
    },
}

impl Transition {
    /// Returns true if the state moved.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Thread-safe holder of a [`ServiceState`].
///
/// The internal lock is the single serialization point for state changes.
/// It is held only for the compare-and-update, never across an await.
#[derive(Debug)]
pub struct StateMachine {
    state: Mutex<ServiceState>,
    label: String,
}

impl StateMachine {
    /// Creates a machine in `NotStarted`. `label` tags its log records.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(ServiceState::NotStarted),
            label: label.into(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Requests a move to `target`.
    ///
    /// Same-state requests return immediately without logging. Requests
    /// outside the transition graph are dropped.
    pub fn request(&self, target: ServiceState) -> Transition {
        let mut state = self.state.lock();
        let current = *state;

        if current == target {
            return Transition::Unchanged(current);
        }

        if !current.can_transition_to(target) {
            tracing::debug!(
                service = %self.label,
                from = %current,
                to = %target,
                "state update rejected"
            );
            return Transition::Rejected {
                from: current,
                to: target,
            };
        }

        *state = target;
        tracing::info!(
            service = %self.label,
            from = %current,
            to = %target,
            "state updated"
        );

        Transition::Applied {
            from: current,
            to: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_machine_not_started() {
        let machine = StateMachine::new("test:1");
        assert_eq!(machine.current(), ServiceState::NotStarted);
    }

    #[test]
    fn test_happy_path() {
        let machine = StateMachine::new("test:1");
        for next in [
            ServiceState::Starting,
            ServiceState::Active,
            ServiceState::ShuttingDown,
            ServiceState::Stopped,
            ServiceState::Disposed,
        ] {
            assert!(machine.request(next).is_applied());
            assert_eq!(machine.current(), next);
        }
    }

    #[test]
    fn test_same_state_unchanged() {
        let machine = StateMachine::new("test:1");
        assert_eq!(
            machine.request(ServiceState::NotStarted),
            Transition::Unchanged(ServiceState::NotStarted)
        );
    }

    #[test]
    fn test_illegal_request_keeps_state() {
        let machine = StateMachine::new("test:1");
        let outcome = machine.request(ServiceState::Active);
        assert_eq!(
            outcome,
            Transition::Rejected {
                from: ServiceState::NotStarted,
                to: ServiceState::Active,
            }
        );
        assert_eq!(machine.current(), ServiceState::NotStarted);
    }

    #[test]
    fn test_fail_start_only_disposes() {
        let machine = StateMachine::new("test:1");
        machine.request(ServiceState::Starting);
        machine.request(ServiceState::FailStart);

        assert!(!machine.request(ServiceState::ShuttingDown).is_applied());
        assert!(!machine.request(ServiceState::Stopped).is_applied());
        assert_eq!(machine.current(), ServiceState::FailStart);

        assert!(machine.request(ServiceState::Disposed).is_applied());
    }

    #[test]
    fn test_disposed_is_terminal() {
        let machine = StateMachine::new("test:1");
        machine.request(ServiceState::Disposed);
        for state in ServiceState::ALL {
            machine.request(state);
            assert_eq!(machine.current(), ServiceState::Disposed);
        }
        assert!(ServiceState::Disposed.is_terminal());
    }

    #[test]
    fn test_is_active_only_in_active() {
        for state in ServiceState::ALL {
            assert_eq!(state.is_active(), state == ServiceState::Active);
        }
    }

    #[test]
    fn test_every_non_terminal_state_can_dispose() {
        for state in ServiceState::ALL {
            if state != ServiceState::Disposed {
                assert!(state.can_transition_to(ServiceState::Disposed), "{state}");
            }
        }
    }

    #[test]
    fn test_display_kebab_case() {
        assert_eq!(ServiceState::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(ServiceState::FailStart.to_string(), "fail-start");
    }
}
