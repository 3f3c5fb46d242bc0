//! Threat analyst step - indicator reputation and verdict.
//!
//! This step handles `RunIntel` by:
//! 1. Looking the indicator up with the reputation service
//! 2. Asking the reasoner to turn the raw report into a verdict
//! 3. Recording the verdict and one trace line

use crate::reputation::ReputationLookup;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vigil_common::{Decision, InvestigationState, PartialUpdate, Result, Step, ThreatIntel};
use vigil_llm::{Reasoner, StructuredPrompt, classify};

const THREAT_ANALYST_SYSTEM_PROMPT: &str = r#"You are a threat intelligence analyst specializing in indicators of compromise.

Decide whether the indicator is malicious using the reputation report you are given.

Detection criteria:
- If ANY engine flags the indicator as malicious or suspicious, it is malicious
- A reputation score of zero or below is suspicious
- Context tying the address to attacks outweighs raw engine counts

Respond with a single JSON object:
{"summary": "<concise findings including reputation and engine counts>", "is_malicious": true|false}
"#;

pub struct ThreatAnalystStep {
    reputation: Arc<dyn ReputationLookup>,
    reasoner: Arc<dyn Reasoner>,
}

impl ThreatAnalystStep {
    pub fn new(reputation: Arc<dyn ReputationLookup>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reputation,
            reasoner,
        }
    }

    fn conclusion(indicator: &str, intel: &ThreatIntel) -> String {
        let verdict = if intel.is_malicious {
            "malicious"
        } else {
            "benign"
        };
        format!("Threat Analyst conclusion: The indicator '{indicator}' is {verdict}.")
    }
}

#[async_trait]
impl Step for ThreatAnalystStep {
    fn name(&self) -> &str {
        "Threat Analyst"
    }

    fn decision(&self) -> Decision {
        Decision::RunIntel
    }

    async fn execute(&self, state: &InvestigationState) -> Result<PartialUpdate> {
        let Some(indicator) = state.indicator() else {
            info!(investigation = %state.id(), "No indicator supplied, recording benign verdict");
            return Ok(PartialUpdate::Intel {
                intel: ThreatIntel {
                    summary: "No indicator was supplied, so no reputation lookup was made.".into(),
                    is_malicious: false,
                },
                trace: "Threat Analyst conclusion: no indicator was supplied.".into(),
            });
        };

        let report = self.reputation.lookup(indicator).await?;
        info!(
            investigation = %state.id(),
            indicator = %indicator,
            flagged = report.is_malicious,
            "Reputation lookup complete"
        );

        let raw = serde_json::to_string_pretty(&report)?;
        let prompt = StructuredPrompt::new(
            "ThreatIntel",
            THREAT_ANALYST_SYSTEM_PROMPT,
            format!(
                "Indicator: {indicator}\n\nHere is the raw data from the reputation service:\n\n{raw}"
            ),
        );
        let intel: ThreatIntel = classify(self.reasoner.as_ref(), prompt).await?;

        Ok(PartialUpdate::Intel {
            trace: Self::conclusion(indicator, &intel),
            intel,
        })
    }
}
