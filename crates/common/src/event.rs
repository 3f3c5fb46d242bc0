//! Progress events emitted while an investigation runs.

use crate::decision::Decision;
use crate::error::ErrorKind;
use crate::state::InvestigationState;
use crate::update::{PartialUpdate, StateField};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run stopped before the supervisor chose to end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    StepBudgetExhausted,
    /// The same decision was about to run again on an unchanged state.
    Stalled,
    Cancelled,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StepBudgetExhausted => "step_budget_exhausted",
            Self::Stalled => "stalled",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One entry in the ordered event stream of a run.
///
/// A run emits zero or more `Step` events followed by exactly one of
/// `Finished`, `Halted` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvestigationEvent {
    Step {
        iteration: usize,
        decision: Decision,
        updated_fields: Vec<StateField>,
        update: PartialUpdate,
    },
    Finished {
        final_state: InvestigationState,
    },
    Halted {
        reason: HaltReason,
        final_state: InvestigationState,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        decision: Option<Decision>,
        kind: ErrorKind,
        error: String,
        final_state: InvestigationState,
    },
}

impl InvestigationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Step { .. })
    }
}

/// How a run ended, as returned to direct callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Finished {
        final_state: InvestigationState,
    },
    Halted {
        reason: HaltReason,
        final_state: InvestigationState,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        decision: Option<Decision>,
        kind: ErrorKind,
        error: String,
        final_state: InvestigationState,
    },
}

impl Outcome {
    pub fn final_state(&self) -> &InvestigationState {
        match self {
            Self::Finished { final_state }
            | Self::Halted { final_state, .. }
            | Self::Failed { final_state, .. } => final_state,
        }
    }

    /// The terminal event matching this outcome.
    pub fn to_event(&self) -> InvestigationEvent {
        match self.clone() {
            Self::Finished { final_state } => InvestigationEvent::Finished { final_state },
            Self::Halted {
                reason,
                final_state,
            } => InvestigationEvent::Halted {
                reason,
                final_state,
            },
            Self::Failed {
                decision,
                kind,
                error,
                final_state,
            } => InvestigationEvent::Error {
                decision,
                kind,
                error,
                final_state,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InvestigationRequest;

    #[test]
    fn step_event_is_not_terminal() {
        let event = InvestigationEvent::Step {
            iteration: 1,
            decision: Decision::RunIntel,
            updated_fields: vec![],
            update: PartialUpdate::Empty,
        };
        assert!(!event.is_terminal());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step");
        assert_eq!(json["decision"], "run_intel");
        assert_eq!(json["update"]["kind"], "empty");
    }

    #[test]
    fn halted_outcome_maps_to_halted_event() {
        let state = InvestigationState::new(InvestigationRequest::new("1.2.3.4", ""));
        let outcome = Outcome::Halted {
            reason: HaltReason::Stalled,
            final_state: state,
        };
        let event = outcome.to_event();
        assert!(event.is_terminal());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "halted");
        assert_eq!(json["reason"], "stalled");
    }
}
