//! Supervisor decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The supervisor's choice of what happens next in an investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    RunIntel,
    RunLogAnalysis,
    RunConsultant,
    RunPolicy,
    EndInvestigation,
}

impl Decision {
    pub const ALL: [Decision; 5] = [
        Decision::RunIntel,
        Decision::RunLogAnalysis,
        Decision::RunConsultant,
        Decision::RunPolicy,
        Decision::EndInvestigation,
    ];

    /// The label the reasoner is constrained to emit for this decision.
    pub fn label(self) -> &'static str {
        match self {
            Self::RunIntel => "Threat_Analyst",
            Self::RunLogAnalysis => "Log_Analyst",
            Self::RunConsultant => "Consultant_Agent",
            Self::RunPolicy => "Policy_Agent",
            Self::EndInvestigation => "end_investigation",
        }
    }

    /// Parse a reasoner label. Labels are matched exactly.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::EndInvestigation)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
