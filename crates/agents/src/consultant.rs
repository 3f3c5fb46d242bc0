//! Consultant step - playbook lookup for detected incidents.
//!
//! This step handles `RunConsultant` by:
//! 1. Building an incident summary from whatever findings exist
//! 2. Retrieving the best matching playbook chunk
//! 3. Asking the reasoner for the procedure's ordered steps

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use vigil_common::{Decision, InvestigationState, PartialUpdate, Result, Step};
use vigil_llm::{Reasoner, StructuredPrompt, classify};
use vigil_playbooks::PlaybookRetriever;

pub const NO_PLAYBOOK_FOUND: &str = "No specific playbook was found for this type of incident.";

const CONSULTANT_SYSTEM_PROMPT: &str = r#"You are an expert cybersecurity consultant. You provide specific, actionable steps taken from the official company playbooks.

A security incident has occurred. Using the incident summary, find the most relevant procedure in the playbook context.

If a relevant procedure is found, list its exact steps in order. If none applies, set "found" to false and leave "steps" empty.

Respond with a single JSON object:
{"found": true|false, "steps": ["<step 1>", "<step 2>", ...]}
"#;

#[derive(Debug, Deserialize)]
struct PlaybookAdvice {
    found: bool,
    #[serde(default)]
    steps: Vec<String>,
}

pub struct ConsultantStep {
    retriever: Arc<dyn PlaybookRetriever>,
    reasoner: Arc<dyn Reasoner>,
}

impl ConsultantStep {
    pub fn new(retriever: Arc<dyn PlaybookRetriever>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            retriever,
            reasoner,
        }
    }

    /// Intel and log summaries when present, otherwise the trace so far.
    pub fn incident_summary(state: &InvestigationState) -> String {
        let mut points = Vec::new();
        if let Some(intel) = state.intel() {
            points.push(format!("Threat Intel Summary: {}", intel.summary));
        }
        if let Some(logs) = state.log_summary() {
            points.push(format!("Log Analysis Summary: {}", logs.summary));
        }
        if points.is_empty() {
            return state.trace().join("\n");
        }
        points.join("\n")
    }

    fn not_found() -> PartialUpdate {
        PartialUpdate::Playbook {
            steps: vec![NO_PLAYBOOK_FOUND.to_string()],
            trace: "Consultant Agent conclusion: no playbook procedure found.".into(),
        }
    }
}

#[async_trait]
impl Step for ConsultantStep {
    fn name(&self) -> &str {
        "Consultant Agent"
    }

    fn decision(&self) -> Decision {
        Decision::RunConsultant
    }

    async fn execute(&self, state: &InvestigationState) -> Result<PartialUpdate> {
        let summary = Self::incident_summary(state);
        let context = self.retriever.retrieve(&summary).await?;

        if context.trim().is_empty() {
            debug!(investigation = %state.id(), "Retrieval returned no playbook context");
            return Ok(Self::not_found());
        }

        let prompt = StructuredPrompt::new(
            "PlaybookAdvice",
            CONSULTANT_SYSTEM_PROMPT,
            format!("Context from Playbooks:\n{context}\n\nIncident Summary:\n{summary}"),
        );
        let advice: PlaybookAdvice = classify(self.reasoner.as_ref(), prompt).await?;

        let steps: Vec<String> = advice
            .steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if !advice.found || steps.is_empty() {
            return Ok(Self::not_found());
        }

        info!(investigation = %state.id(), steps = steps.len(), "Playbook procedure found");
        Ok(PartialUpdate::Playbook {
            steps,
            trace: "Consultant Agent conclusion: playbook procedure found.".into(),
        })
    }
}
