//! Log analyst step.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use vigil_common::{Decision, InvestigationState, LogAnalysis, PartialUpdate, Result, Step};
use vigil_llm::{Reasoner, StructuredPrompt, classify};

const LOG_ANALYST_SYSTEM_PROMPT: &str = r#"You are a senior security analyst specializing in log analysis. Review the logs and identify suspicious or anomalous activity.

Look for patterns such as:
- Several failed logins followed by a success
- Access to sensitive files or directories
- Unusual commands being executed
- Connections from unexpected addresses or ports

Summarize the key events and give a final verdict.

Respond with a single JSON object:
{"summary": "<key events and their significance>", "contains_anomaly": true|false}
"#;

pub struct LogAnalystStep {
    reasoner: Arc<dyn Reasoner>,
}

impl LogAnalystStep {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }
}

#[async_trait]
impl Step for LogAnalystStep {
    fn name(&self) -> &str {
        "Log Analyst"
    }

    fn decision(&self) -> Decision {
        Decision::RunLogAnalysis
    }

    async fn execute(&self, state: &InvestigationState) -> Result<PartialUpdate> {
        let Some(logs) = state.logs() else {
            debug!(investigation = %state.id(), "No logs to analyze");
            return Ok(PartialUpdate::Empty);
        };

        let prompt = StructuredPrompt::new(
            "LogAnalysis",
            LOG_ANALYST_SYSTEM_PROMPT,
            format!("Please analyze the following logs related to the alert:\n\n{logs}"),
        );
        let log_summary: LogAnalysis = classify(self.reasoner.as_ref(), prompt).await?;
        info!(
            investigation = %state.id(),
            anomaly = log_summary.contains_anomaly,
            "Log analysis complete"
        );

        Ok(PartialUpdate::LogAnalysis {
            trace: format!(
                "Log Analyst conclusion: Anomaly detected: {}.",
                log_summary.contains_anomaly
            ),
            log_summary,
        })
    }
}
