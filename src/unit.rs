//! Lifecycle of a single unit of work.
//!
//! `Pending -> Built -> Sent -> {Completed | Failed}`. A unit may also fail
//! before it is sent (serialization, cancellation), but nothing ever moves
//! backwards and a terminal state is entered at most once.

use std::fmt;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Pending,
    Built,
    Sent,
    Completed,
    Failed,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Completed | UnitState::Failed)
    }

    pub fn can_transition_to(self, next: UnitState) -> bool {
        use UnitState::*;
        match (self, next) {
            (Pending, Built) | (Built, Sent) | (Sent, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitState::Pending => "PENDING",
            UnitState::Built => "BUILT",
            UnitState::Sent => "SENT",
            UnitState::Completed => "COMPLETED",
            UnitState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unit {index}: invalid transition {from} -> {to}")]
pub struct InvalidTransition {
    pub index: usize,
    pub from: UnitState,
    pub to: UnitState,
}

/// Tracks the current state of one unit.
#[derive(Debug, Clone)]
pub struct UnitLifecycle {
    index: usize,
    state: UnitState,
}

impl UnitLifecycle {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: UnitState::Pending,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn advance(&mut self, next: UnitState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                index: self.index,
                from: self.state,
                to: next,
            });
        }
        trace!(index = self.index, from = %self.state, to = %next, "Unit transition");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let mut unit = UnitLifecycle::new(3);
        unit.advance(UnitState::Built).unwrap();
        unit.advance(UnitState::Sent).unwrap();
        unit.advance(UnitState::Completed).unwrap();
        assert_eq!(unit.state(), UnitState::Completed);
        assert!(unit.state().is_terminal());
    }

    #[test]
    fn sent_unit_can_fail() {
        let mut unit = UnitLifecycle::new(0);
        unit.advance(UnitState::Built).unwrap();
        unit.advance(UnitState::Sent).unwrap();
        unit.advance(UnitState::Failed).unwrap();
        assert_eq!(unit.state(), UnitState::Failed);
    }

    #[test]
    fn built_unit_can_fail_without_sending() {
        let mut unit = UnitLifecycle::new(0);
        unit.advance(UnitState::Built).unwrap();
        assert!(unit.advance(UnitState::Failed).is_ok());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut unit = UnitLifecycle::new(9);
        unit.advance(UnitState::Built).unwrap();
        unit.advance(UnitState::Sent).unwrap();
        unit.advance(UnitState::Completed).unwrap();

        let err = unit.advance(UnitState::Failed).unwrap_err();
        assert_eq!(err.from, UnitState::Completed);
        assert_eq!(err.to, UnitState::Failed);
        assert!(unit.advance(UnitState::Completed).is_err());
    }

    #[test]
    fn states_cannot_be_skipped_or_reversed() {
        let mut unit = UnitLifecycle::new(1);
        assert!(unit.advance(UnitState::Sent).is_err());
        assert!(unit.advance(UnitState::Completed).is_err());

        unit.advance(UnitState::Built).unwrap();
        assert!(unit.advance(UnitState::Pending).is_err());
        assert!(unit.advance(UnitState::Completed).is_err());
        assert_eq!(unit.state(), UnitState::Built);
    }

    #[test]
    fn invalid_transition_message_names_unit() {
        let mut unit = UnitLifecycle::new(12);
        let err = unit.advance(UnitState::Sent).unwrap_err();
        assert_eq!(err.to_string(), "unit 12: invalid transition PENDING -> SENT");
    }
}
