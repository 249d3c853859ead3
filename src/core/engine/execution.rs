//! Per-report execution state machine
//!
//! ```text
//! Pending ──► Fetching ──► Transforming ──► Succeeded
//!    │           │              │
//!    ▼           ▼              ▼
//! Cancelled   Failed(Fetching) Failed(Transforming)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage a report was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStage {
    Fetching,
    Transforming,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStage::Fetching => write!(f, "fetching"),
            ExecutionStage::Transforming => write!(f, "transforming"),
        }
    }
}

/// Lifecycle state of one report execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Pending,
    Fetching,
    Transforming,
    Succeeded,
    Failed(ExecutionStage),
    Cancelled,
}

impl ExecutionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed(_) | ExecutionState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Cancelled)
                | (Fetching, Transforming)
                | (Fetching, Failed(ExecutionStage::Fetching))
                | (Transforming, Succeeded)
                | (Transforming, Failed(ExecutionStage::Transforming))
        )
    }

    /// Stage a failure would be attributed to from this state
    pub fn stage(&self) -> Option<ExecutionStage> {
        match self {
            ExecutionState::Fetching => Some(ExecutionStage::Fetching),
            ExecutionState::Transforming => Some(ExecutionStage::Transforming),
            ExecutionState::Failed(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Pending => write!(f, "pending"),
            ExecutionState::Fetching => write!(f, "fetching"),
            ExecutionState::Transforming => write!(f, "transforming"),
            ExecutionState::Succeeded => write!(f, "succeeded"),
            ExecutionState::Failed(stage) => write!(f, "failed while {stage}"),
            ExecutionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Tracks the state of a single execution and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct ExecutionTracker {
    state: ExecutionState,
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self {
            state: ExecutionState::Pending,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Moves to `next`
    ///
    /// # Errors
    ///
    /// Returns a description of the rejected transition; the state is left
    /// unchanged in that case
    pub fn advance(&mut self, next: ExecutionState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(format!(
                "Illegal execution transition from {} to {}",
                self.state, next
            ));
        }
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` attributed to the current stage
    ///
    /// # Errors
    ///
    /// Returns an error when the current state has no stage to fail in
    pub fn fail(&mut self) -> Result<ExecutionStage, String> {
        let stage = self
            .state
            .stage()
            .filter(|_| !self.state.is_terminal())
            .ok_or_else(|| format!("Cannot fail an execution that is {}", self.state))?;
        self.advance(ExecutionState::Failed(stage))?;
        Ok(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_happy_path() {
        let mut tracker = ExecutionTracker::new();
        tracker.advance(ExecutionState::Fetching).unwrap();
        tracker.advance(ExecutionState::Transforming).unwrap();
        tracker.advance(ExecutionState::Succeeded).unwrap();
        assert!(tracker.state().is_terminal());
    }

    #[test_case(ExecutionState::Pending, ExecutionState::Transforming ; "cannot skip fetching")]
    #[test_case(ExecutionState::Pending, ExecutionState::Succeeded ; "cannot succeed unstarted")]
    #[test_case(ExecutionState::Fetching, ExecutionState::Cancelled ; "in flight is not cancelled")]
    #[test_case(ExecutionState::Fetching, ExecutionState::Failed(ExecutionStage::Transforming) ; "stage must match")]
    #[test_case(ExecutionState::Succeeded, ExecutionState::Failed(ExecutionStage::Transforming) ; "terminal stays terminal")]
    #[test_case(ExecutionState::Cancelled, ExecutionState::Fetching ; "cancelled stays cancelled")]
    fn test_illegal_transitions(from: ExecutionState, to: ExecutionState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn test_rejected_transition_keeps_state() {
        let mut tracker = ExecutionTracker::new();
        let err = tracker.advance(ExecutionState::Succeeded).unwrap_err();
        assert!(err.contains("pending"));
        assert_eq!(tracker.state(), ExecutionState::Pending);
    }

    #[test]
    fn test_fail_records_current_stage() {
        let mut tracker = ExecutionTracker::new();
        tracker.advance(ExecutionState::Fetching).unwrap();
        tracker.advance(ExecutionState::Transforming).unwrap();
        assert_eq!(tracker.fail().unwrap(), ExecutionStage::Transforming);
        assert_eq!(
            tracker.state(),
            ExecutionState::Failed(ExecutionStage::Transforming)
        );
        assert!(tracker.fail().is_err());
    }

    #[test]
    fn test_pending_cannot_fail() {
        assert!(ExecutionTracker::new().fail().is_err());
    }
}
