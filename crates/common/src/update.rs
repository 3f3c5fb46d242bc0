//! Partial updates returned by investigation steps.

use crate::decision::Decision;
use crate::state::{FirewallRule, LogAnalysis, ThreatIntel};
use serde::{Deserialize, Serialize};

/// Fields of [`crate::InvestigationState`] that steps may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Intel,
    LogSummary,
    PlaybookSteps,
    Policy,
    InvestigationTrace,
}

/// What a step produced. Each variant names exactly the fields one step owns,
/// plus the single trace line it appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartialUpdate {
    /// The step had nothing to work with. No fields, no trace line.
    Empty,
    Intel { intel: ThreatIntel, trace: String },
    LogAnalysis { log_summary: LogAnalysis, trace: String },
    Playbook { steps: Vec<String>, trace: String },
    Policy { policy: FirewallRule, trace: String },
}

impl PartialUpdate {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The decision whose step is allowed to produce this update.
    /// `None` for [`PartialUpdate::Empty`], which any step may return.
    pub fn owner(&self) -> Option<Decision> {
        match self {
            Self::Empty => None,
            Self::Intel { .. } => Some(Decision::RunIntel),
            Self::LogAnalysis { .. } => Some(Decision::RunLogAnalysis),
            Self::Playbook { .. } => Some(Decision::RunConsultant),
            Self::Policy { .. } => Some(Decision::RunPolicy),
        }
    }

    pub fn fields(&self) -> Vec<StateField> {
        match self {
            Self::Empty => vec![],
            Self::Intel { .. } => vec![StateField::Intel, StateField::InvestigationTrace],
            Self::LogAnalysis { .. } => {
                vec![StateField::LogSummary, StateField::InvestigationTrace]
            }
            Self::Playbook { .. } => {
                vec![StateField::PlaybookSteps, StateField::InvestigationTrace]
            }
            Self::Policy { .. } => vec![StateField::Policy, StateField::InvestigationTrace],
        }
    }

    pub fn trace_line(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Intel { trace, .. }
            | Self::LogAnalysis { trace, .. }
            | Self::Playbook { trace, .. }
            | Self::Policy { trace, .. } => Some(trace),
        }
    }
}
