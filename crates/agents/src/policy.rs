//! Policy step - firewall rule generation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vigil_common::{
    Decision, FirewallRule, InvestigationState, PartialUpdate, Result, Step, VigilError,
};
use vigil_llm::{Reasoner, StructuredPrompt, classify};

const POLICY_SYSTEM_PROMPT: &str = r#"You are a senior network security engineer. Generate one specific, machine-readable firewall rule from a security investigation.

Unless the findings say otherwise, generate a BLOCK rule for the malicious address that applies to any protocol.

Respond with a single JSON object:
{"name": "<descriptive name, e.g. Block-Malicious-IP-203.0.113.7>", "action": "BLOCK"|"ALLOW"|"LOG", "source_ip": "<address>", "protocol": "TCP"|"UDP"|"ANY"}
"#;

pub struct PolicyStep {
    reasoner: Arc<dyn Reasoner>,
}

impl PolicyStep {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    fn validate(rule: &FirewallRule) -> Result<()> {
        if rule.name.trim().is_empty() {
            return Err(VigilError::Classification("firewall rule has an empty name".into()));
        }
        if rule.source_ip.trim().is_empty() {
            return Err(VigilError::Classification(
                "firewall rule has an empty source_ip".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Step for PolicyStep {
    fn name(&self) -> &str {
        "Policy Agent"
    }

    fn decision(&self) -> Decision {
        Decision::RunPolicy
    }

    async fn execute(&self, state: &InvestigationState) -> Result<PartialUpdate> {
        let indicator = state
            .indicator()
            .unwrap_or("none supplied (derive the address from the findings)");

        let prompt = StructuredPrompt::new(
            "FirewallRule",
            POLICY_SYSTEM_PROMPT,
            format!(
                "The investigation has confirmed a threat.\nIndicator: {indicator}\n\nSummary of findings:\n{}",
                state.trace().join("\n")
            ),
        );
        let policy: FirewallRule = classify(self.reasoner.as_ref(), prompt).await?;
        Self::validate(&policy)?;

        info!(investigation = %state.id(), rule = %policy.name, "Firewall rule generated");
        Ok(PartialUpdate::Policy {
            trace: format!("Policy Agent conclusion: generated rule '{}'.", policy.name),
            policy,
        })
    }
}
