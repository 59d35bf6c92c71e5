//! Terminal result of one dispatched unit.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::DispatchError;
use crate::unit::UnitState;

/// Either a response arrived (any status) or it did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed { status: u16, reason: String },
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn completed(status: reqwest::StatusCode) -> Self {
        DispatchOutcome::Completed {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
        }
    }

    pub fn state(&self) -> UnitState {
        match self {
            DispatchOutcome::Completed { .. } => UnitState::Completed,
            DispatchOutcome::Failed(_) => UnitState::Failed,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchOutcome::Completed { status, .. } => Some(*status),
            DispatchOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            DispatchOutcome::Completed { .. } => None,
            DispatchOutcome::Failed(e) => Some(e),
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Completed { status, reason } if reason.is_empty() => {
                write!(f, "{}", status)
            }
            DispatchOutcome::Completed { status, reason } => write!(f, "{} {}", status, reason),
            DispatchOutcome::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// What a sink receives for each unit.
#[derive(Debug, Clone)]
pub struct OutcomeReport {
    /// 0-based unit index.
    pub index: usize,
    pub code: String,
    pub outcome: DispatchOutcome,
    /// When the engine launched the unit's task.
    pub launched_at: Instant,
    /// Launch to terminal state.
    pub latency: Duration,
}

impl OutcomeReport {
    /// The single line written to the console for this unit.
    pub fn line(&self) -> String {
        match &self.outcome {
            DispatchOutcome::Completed { .. } => {
                format!("Response received -> {}: {}", self.index, self.outcome)
            }
            DispatchOutcome::Failed(_) => {
                format!("Request failed -> {}: {}", self.index, self.outcome)
            }
        }
    }
}
