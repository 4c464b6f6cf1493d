//! Server lifecycle state machine.
//!
//! ```text
//! Unstarted → Starting → Running → Stopping → Stopped
//!                 ↓
//!              Failed
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unstarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unstarted => "unstarted",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Unstarted, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Whether no listener can be open in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transition {} → {}", self.from.as_str(), self.to.as_str())
    }
}

impl std::error::Error for InvalidTransition {}

/// Current state plus enforced transitions.
#[derive(Debug)]
pub struct StateMachine {
    state: LifecycleState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unstarted,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn transition(&mut self, next: LifecycleState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = self.state.as_str(), to = next.as_str(), "Lifecycle transition");
        self.state = next;
        crate::observability::metrics::record_transition(next);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn happy_path() {
        let mut sm = StateMachine::new();
        for next in [Starting, Running, Stopping, Stopped] {
            sm.transition(next).unwrap();
        }
        assert_eq!(sm.state(), Stopped);
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn failed_only_from_starting() {
        assert!(Starting.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Failed));
        assert!(!Unstarted.can_transition_to(Failed));
    }

    #[test]
    fn rejects_skipping_states() {
        let mut sm = StateMachine::new();
        let err = sm.transition(Running).unwrap_err();
        assert_eq!(err, InvalidTransition { from: Unstarted, to: Running });
        assert_eq!(sm.state(), Unstarted);
    }

    #[test]
    fn terminal_states_are_final() {
        for from in [Stopped, Failed] {
            for to in [Unstarted, Starting, Running, Stopping, Stopped, Failed] {
                assert!(!from.can_transition_to(to));
            }
        }
    }
}
