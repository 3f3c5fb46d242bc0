//! Routing facts and transition tables.
//!
//! A table is an ordered list of guard → decision rules; the first rule whose
//! guard holds wins. Tables are plain data so they can be inspected, versioned
//! and swapped without touching the supervisor.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::error;
use vigil_common::{Decision, InvestigationState, Result, VigilError};

/// The booleans the supervisor decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingFacts {
    pub intel_available: bool,
    pub log_available: bool,
    pub threat_detected: bool,
    pub playbook_consulted: bool,
    pub policy_generated: bool,
}

impl RoutingFacts {
    pub fn from_state(state: &InvestigationState) -> Self {
        Self {
            intel_available: state.intel().is_some(),
            log_available: state.log_summary().is_some(),
            threat_detected: state.threat_detected(),
            playbook_consulted: state.playbook_steps().is_some(),
            policy_generated: state.policy().is_some(),
        }
    }
}

impl fmt::Display for RoutingFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yn = |b: bool| if b { "Yes" } else { "No" };
        write!(
            f,
            "- Intel available: {}\n- Log Summary available: {}\n- Threat Detected: {}\n- Playbook Consulted: {}\n- Policy Generated: {}",
            yn(self.intel_available),
            yn(self.log_available),
            yn(self.threat_detected),
            yn(self.playbook_consulted),
            yn(self.policy_generated),
        )
    }
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy)]
pub struct RoutingRule {
    pub name: &'static str,
    pub guard: fn(&RoutingFacts) -> bool,
    pub decision: Decision,
}

/// Selects one of the built-in tables from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    #[default]
    FastTrack,
    Consultative,
}

#[derive(Debug, Clone)]
pub struct RuleTable {
    name: &'static str,
    version: u32,
    rules: Vec<RoutingRule>,
}

impl RuleTable {
    pub fn new(name: &'static str, version: u32, rules: Vec<RoutingRule>) -> Self {
        Self {
            name,
            version,
            rules,
        }
    }

    pub fn from_kind(kind: TableKind) -> Self {
        match kind {
            TableKind::FastTrack => Self::fast_track(),
            TableKind::Consultative => Self::consultative(),
        }
    }

    /// The default table: policy straight after a detected threat.
    pub fn fast_track() -> Self {
        Self::new(
            "fast_track",
            1,
            vec![
                RoutingRule {
                    name: "gather_intel",
                    guard: |f| !f.intel_available,
                    decision: Decision::RunIntel,
                },
                RoutingRule {
                    name: "analyze_logs",
                    guard: |f| f.intel_available && !f.threat_detected && !f.log_available,
                    decision: Decision::RunLogAnalysis,
                },
                RoutingRule {
                    name: "generate_policy",
                    guard: |f| f.threat_detected && !f.policy_generated,
                    decision: Decision::RunPolicy,
                },
                RoutingRule {
                    name: "end",
                    guard: |f| {
                        (!f.threat_detected && f.intel_available && f.log_available)
                            || (f.threat_detected && f.policy_generated)
                    },
                    decision: Decision::EndInvestigation,
                },
            ],
        )
    }

    /// Legacy table: a detected threat must consult the playbooks before policy.
    pub fn consultative() -> Self {
        Self::new(
            "consultative",
            1,
            vec![
                RoutingRule {
                    name: "gather_intel",
                    guard: |f| !f.intel_available,
                    decision: Decision::RunIntel,
                },
                RoutingRule {
                    name: "analyze_logs",
                    guard: |f| f.intel_available && !f.threat_detected && !f.log_available,
                    decision: Decision::RunLogAnalysis,
                },
                RoutingRule {
                    name: "consult_playbook",
                    guard: |f| f.threat_detected && !f.playbook_consulted,
                    decision: Decision::RunConsultant,
                },
                RoutingRule {
                    name: "generate_policy",
                    guard: |f| f.threat_detected && f.playbook_consulted && !f.policy_generated,
                    decision: Decision::RunPolicy,
                },
                RoutingRule {
                    name: "end",
                    guard: |f| {
                        (!f.threat_detected && f.intel_available && f.log_available)
                            || (f.threat_detected && f.policy_generated)
                    },
                    decision: Decision::EndInvestigation,
                },
            ],
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Every decision some rule can produce.
    pub fn decisions(&self) -> HashSet<Decision> {
        self.rules.iter().map(|r| r.decision).collect()
    }

    pub fn allows(&self, decision: Decision) -> bool {
        self.rules.iter().any(|r| r.decision == decision)
    }

    /// First matching rule wins. No match is a routing error, never a silent end.
    pub fn evaluate(&self, facts: &RoutingFacts) -> Result<Decision> {
        self.matching_rule(facts)
            .map(|rule| rule.decision)
            .ok_or_else(|| {
                error!(table = self.name, facts = ?facts, "No routing rule matched");
                VigilError::Routing(format!(
                    "no rule in table '{}' v{} matched facts {facts:?}",
                    self.name, self.version
                ))
            })
    }

    pub fn matching_rule(&self, facts: &RoutingFacts) -> Option<&RoutingRule> {
        self.rules.iter().find(|rule| (rule.guard)(facts))
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::fast_track()
    }
}
