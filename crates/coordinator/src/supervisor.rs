//! The supervisor: decides what happens next in an investigation.
//!
//! In `rules` mode the active [`RuleTable`] decides alone. In `reasoner` mode
//! the reasoner picks a label constrained to the table's decisions, and the
//! table is evaluated alongside so disagreements show up in the logs.

use crate::routing::{RoutingFacts, RuleTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};
use vigil_common::{Decision, InvestigationState, Result, VigilError};
use vigil_llm::{Reasoner, StructuredPrompt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorMode {
    #[default]
    Rules,
    Reasoner,
}

const SUPERVISOR_SYSTEM_PROMPT: &str = r#"You are a senior SOC supervisor orchestrating a team of specialist agents that investigate a security alert.

Decide the next step from the current state of the investigation.

Decision process:
1. No threat intelligence yet (Intel available is No): call Threat_Analyst.
2. Intel shows NO threat and the logs are unanalyzed: call Log_Analyst.
3. A threat was detected: generate a firewall rule with Policy_Agent.
4. All analyses are complete and no threat was found, OR a threat was found and a policy exists: end_investigation.
"#;

const CONSULTATIVE_ADDENDUM: &str = r#"
Playbook rule: when a threat was detected and no playbook has been consulted yet, call Consultant_Agent BEFORE Policy_Agent.
"#;

pub struct Supervisor {
    table: RuleTable,
    reasoner: Option<Arc<dyn Reasoner>>,
}

impl Supervisor {
    /// Deterministic supervisor driven by `table` alone.
    pub fn new(table: RuleTable) -> Self {
        Self {
            table,
            reasoner: None,
        }
    }

    /// Reasoner-driven supervisor constrained to `table`'s decisions.
    pub fn with_reasoner(table: RuleTable, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            table,
            reasoner: Some(reasoner),
        }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn mode(&self) -> SupervisorMode {
        if self.reasoner.is_some() {
            SupervisorMode::Reasoner
        } else {
            SupervisorMode::Rules
        }
    }

    pub async fn decide(&self, state: &InvestigationState) -> Result<Decision> {
        let facts = RoutingFacts::from_state(state);
        let by_rules = self.table.evaluate(&facts);

        let Some(reasoner) = &self.reasoner else {
            if let Ok(decision) = &by_rules {
                debug!(investigation = %state.id(), facts = ?facts, decision = %decision, "Rule table decided");
            }
            return by_rules;
        };

        let decision = self.ask_reasoner(reasoner.as_ref(), state, &facts).await?;
        match &by_rules {
            Ok(expected) if *expected != decision => warn!(
                investigation = %state.id(),
                reasoner = %decision,
                table = %expected,
                "Reasoner disagrees with rule table"
            ),
            Err(e) => warn!(investigation = %state.id(), error = %e, "Rule table had no answer"),
            _ => debug!(investigation = %state.id(), decision = %decision, "Reasoner decided"),
        }
        Ok(decision)
    }

    async fn ask_reasoner(
        &self,
        reasoner: &dyn Reasoner,
        state: &InvestigationState,
        facts: &RoutingFacts,
    ) -> Result<Decision> {
        let labels: Vec<&str> = Decision::ALL
            .into_iter()
            .filter(|d| self.table.allows(*d))
            .map(Decision::label)
            .collect();

        let mut system = SUPERVISOR_SYSTEM_PROMPT.to_string();
        if self.table.allows(Decision::RunConsultant) {
            system.push_str(CONSULTATIVE_ADDENDUM);
        }
        system.push_str(&format!(
            "\nRespond with a single JSON object: {{\"next\": \"<one of {}>\"}}\n",
            labels.join(", ")
        ));

        let user = format!(
            "Current state of the investigation:\n{facts}\n- Trace: {}\n\nWhat is the next step?",
            state.trace().join(" | ")
        );

        let answer = reasoner
            .classify_raw(StructuredPrompt::new("Route", system, user))
            .await
            .map_err(|e| match e {
                VigilError::Classification(msg) => routing_error(state, msg),
                other => other,
            })?;

        let label = answer
            .get("next")
            .and_then(|v| v.as_str())
            .ok_or_else(|| routing_error(state, format!("reasoner answer has no 'next' label: {answer}")))?;

        let decision = Decision::from_label(label)
            .ok_or_else(|| routing_error(state, format!("unknown label '{label}'")))?;

        if !self.table.allows(decision) {
            return Err(routing_error(
                state,
                format!("label '{label}' is not in table '{}'", self.table.name()),
            ));
        }
        if already_done(decision, facts) {
            return Err(routing_error(
                state,
                format!("'{label}' would redo a step whose result is already recorded"),
            ));
        }
        Ok(decision)
    }
}

fn already_done(decision: Decision, facts: &RoutingFacts) -> bool {
    match decision {
        Decision::RunIntel => facts.intel_available,
        Decision::RunLogAnalysis => facts.log_available,
        Decision::RunConsultant => facts.playbook_consulted,
        Decision::RunPolicy => facts.policy_generated,
        Decision::EndInvestigation => false,
    }
}

fn routing_error(state: &InvestigationState, msg: String) -> VigilError {
    error!(investigation = %state.id(), error = %msg, "Supervisor routing error");
    VigilError::Routing(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_common::{InvestigationRequest, PartialUpdate, ThreatIntel};

    struct FixedLabel {
        answer: Value,
        calls: AtomicUsize,
    }

    impl FixedLabel {
        fn new(answer: Value) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Reasoner for FixedLabel {
        async fn classify_raw(&self, _prompt: StructuredPrompt) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    fn fresh() -> InvestigationState {
        InvestigationState::new(InvestigationRequest::new("198.51.100.10", "logs"))
    }

    fn with_benign_intel() -> InvestigationState {
        let mut state = fresh();
        state
            .apply(
                Decision::RunIntel,
                PartialUpdate::Intel {
                    intel: ThreatIntel {
                        summary: "clean".into(),
                        is_malicious: false,
                    },
                    trace: "Threat Analyst conclusion: The indicator '198.51.100.10' is benign."
                        .into(),
                },
            )
            .unwrap();
        state
    }

    #[tokio::test]
    async fn rules_mode_follows_table() {
        let supervisor = Supervisor::new(RuleTable::fast_track());
        assert_eq!(supervisor.mode(), SupervisorMode::Rules);
        assert_eq!(supervisor.decide(&fresh()).await.unwrap(), Decision::RunIntel);
        assert_eq!(
            supervisor.decide(&with_benign_intel()).await.unwrap(),
            Decision::RunLogAnalysis
        );
    }

    #[tokio::test]
    async fn reasoner_label_is_used() {
        let reasoner = FixedLabel::new(json!({"next": "Threat_Analyst"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner.clone());
        assert_eq!(supervisor.decide(&fresh()).await.unwrap(), Decision::RunIntel);
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_label_is_routing_error() {
        let reasoner = FixedLabel::new(json!({"next": "Shell_Agent"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner);
        let err = supervisor.decide(&fresh()).await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
    }

    #[tokio::test]
    async fn label_outside_table_is_routing_error() {
        let reasoner = FixedLabel::new(json!({"next": "Consultant_Agent"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner);
        let err = supervisor.decide(&fresh()).await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
    }

    #[tokio::test]
    async fn missing_next_is_routing_error() {
        let reasoner = FixedLabel::new(json!({"route": "Log_Analyst"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner);
        let err = supervisor.decide(&fresh()).await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
    }

    #[tokio::test]
    async fn reasoner_cannot_redo_intel() {
        let reasoner = FixedLabel::new(json!({"next": "Threat_Analyst"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner);
        let err = supervisor.decide(&with_benign_intel()).await.unwrap_err();
        assert!(matches!(err, VigilError::Routing(_)));
    }

    #[tokio::test]
    async fn disagreement_still_follows_reasoner() {
        let reasoner = FixedLabel::new(json!({"next": "end_investigation"}));
        let supervisor = Supervisor::with_reasoner(RuleTable::fast_track(), reasoner);
        assert_eq!(
            supervisor.decide(&with_benign_intel()).await.unwrap(),
            Decision::EndInvestigation
        );
    }
}
