//! Integration tests for the investigation steps.
//!
//! These tests drive each step against scripted collaborators so that no
//! network access or model is required.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vigil_agents::{
    AnalysisStats, ConsultantStep, LogAnalystStep, NO_PLAYBOOK_FOUND, PolicyStep,
    ReputationLookup, ReputationReport, ThreatAnalystStep,
};
use vigil_common::{
    Decision, InvestigationRequest, InvestigationState, PartialUpdate, Protocol, Result,
    RuleAction, Step, StateField, ThreatIntel, VigilError,
};
use vigil_llm::{Reasoner, StructuredPrompt};
use vigil_playbooks::PlaybookRetriever;

/// A reasoner that replays canned answers and remembers the prompts it saw.
struct ScriptedReasoner {
    answers: Mutex<Vec<Value>>,
    prompts: Mutex<Vec<StructuredPrompt>>,
}

impl ScriptedReasoner {
    fn new(answers: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_user_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().unwrap().user.clone()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn classify_raw(&self, prompt: StructuredPrompt) -> Result<Value> {
        self.prompts.lock().unwrap().push(prompt);
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            return Err(VigilError::ExternalCall("no scripted answer left".into()));
        }
        Ok(answers.remove(0))
    }
}

struct FakeReputation {
    malicious: u64,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeReputation {
    fn new(malicious: u64) -> Arc<Self> {
        Arc::new(Self {
            malicious,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            malicious: 0,
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReputationLookup for FakeReputation {
    async fn lookup(&self, indicator: &str) -> Result<ReputationReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VigilError::ExternalCall("VirusTotal API error 503".into()));
        }
        Ok(ReputationReport::new(
            indicator,
            Some(0),
            AnalysisStats {
                harmless: 50,
                malicious: self.malicious,
                suspicious: 0,
                undetected: 20,
            },
        ))
    }
}

struct FixedRetriever {
    context: String,
    queries: Mutex<Vec<String>>,
}

impl FixedRetriever {
    fn new(context: &str) -> Arc<Self> {
        Arc::new(Self {
            context: context.to_string(),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PlaybookRetriever for FixedRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.context.clone())
    }
}

fn state(indicator: &str, logs: &str) -> InvestigationState {
    InvestigationState::new(InvestigationRequest::new(indicator, logs))
}

fn with_intel(mut state: InvestigationState, malicious: bool) -> InvestigationState {
    let verdict = if malicious { "malicious" } else { "benign" };
    let trace = format!(
        "Threat Analyst conclusion: The indicator '{}' is {verdict}.",
        state.indicator().unwrap_or_default()
    );
    state
        .apply(
            Decision::RunIntel,
            PartialUpdate::Intel {
                intel: ThreatIntel {
                    summary: format!("Engines call it {verdict}"),
                    is_malicious: malicious,
                },
                trace,
            },
        )
        .unwrap();
    state
}

#[tokio::test]
async fn test_threat_analyst_malicious_verdict() {
    let reputation = FakeReputation::new(9);
    let reasoner = ScriptedReasoner::new(vec![json!({
        "summary": "9 engines flag 198.51.100.10",
        "is_malicious": true
    })]);
    let step = ThreatAnalystStep::new(reputation.clone(), reasoner.clone());
    assert_eq!(step.decision(), Decision::RunIntel);

    let update = step.execute(&state("198.51.100.10", "")).await.unwrap();

    assert_eq!(update.owner(), Some(Decision::RunIntel));
    assert_eq!(
        update.trace_line(),
        Some("Threat Analyst conclusion: The indicator '198.51.100.10' is malicious.")
    );
    assert_eq!(reputation.calls.load(Ordering::SeqCst), 1);
    assert!(reasoner.last_user_prompt().contains("\"malicious\": 9"));
}

#[tokio::test]
async fn test_threat_analyst_without_indicator_skips_lookup() {
    let reputation = FakeReputation::new(0);
    let reasoner = ScriptedReasoner::new(vec![]);
    let step = ThreatAnalystStep::new(reputation.clone(), reasoner.clone());

    let update = step.execute(&state("", "some logs")).await.unwrap();

    match update {
        PartialUpdate::Intel { intel, trace } => {
            assert!(!intel.is_malicious);
            assert_eq!(trace, "Threat Analyst conclusion: no indicator was supplied.");
        }
        other => panic!("unexpected update {other:?}"),
    }
    assert_eq!(reputation.calls.load(Ordering::SeqCst), 0);
    assert_eq!(reasoner.calls(), 0);
}

#[tokio::test]
async fn test_threat_analyst_lookup_failure_propagates() {
    let reasoner = ScriptedReasoner::new(vec![]);
    let step = ThreatAnalystStep::new(FakeReputation::failing(), reasoner.clone());

    let err = step.execute(&state("8.8.8.8", "")).await.unwrap_err();
    assert!(matches!(err, VigilError::ExternalCall(_)));
    assert_eq!(reasoner.calls(), 0);
}

#[tokio::test]
async fn test_threat_analyst_schema_violation() {
    let reasoner = ScriptedReasoner::new(vec![json!({"verdict": "bad"})]);
    let step = ThreatAnalystStep::new(FakeReputation::new(0), reasoner);

    let err = step.execute(&state("8.8.8.8", "")).await.unwrap_err();
    assert!(matches!(err, VigilError::Classification(_)));
}

#[tokio::test]
async fn test_log_analyst_detects_anomaly() {
    let reasoner = ScriptedReasoner::new(vec![json!({
        "summary": "admin ran a full database dump after three failed logins",
        "contains_anomaly": true
    })]);
    let step = LogAnalystStep::new(reasoner.clone());
    let logs = "Failed login admin x3\nLogin success admin\npg_dump prod";

    let update = step.execute(&state("8.8.8.8", logs)).await.unwrap();

    assert_eq!(update.fields(), vec![StateField::LogSummary, StateField::InvestigationTrace]);
    assert_eq!(
        update.trace_line(),
        Some("Log Analyst conclusion: Anomaly detected: true.")
    );
    assert!(reasoner.last_user_prompt().contains("pg_dump prod"));
}

#[tokio::test]
async fn test_log_analyst_without_logs_is_empty() {
    let reasoner = ScriptedReasoner::new(vec![]);
    let step = LogAnalystStep::new(reasoner.clone());

    let update = step.execute(&state("8.8.8.8", "")).await.unwrap();
    assert!(update.is_empty());
    assert_eq!(reasoner.calls(), 0);
}

#[tokio::test]
async fn test_consultant_without_context_reports_no_playbook() {
    let retriever = FixedRetriever::new("");
    let reasoner = ScriptedReasoner::new(vec![]);
    let step = ConsultantStep::new(retriever.clone(), reasoner.clone());

    let update = step
        .execute(&with_intel(state("198.51.100.10", ""), true))
        .await
        .unwrap();

    match update {
        PartialUpdate::Playbook { steps, trace } => {
            assert_eq!(steps, vec![NO_PLAYBOOK_FOUND.to_string()]);
            assert_eq!(trace, "Consultant Agent conclusion: no playbook procedure found.");
        }
        other => panic!("unexpected update {other:?}"),
    }
    assert_eq!(reasoner.calls(), 0);
    let queries = retriever.queries.lock().unwrap();
    assert!(queries[0].starts_with("Threat Intel Summary: Engines call it malicious"));
}

#[tokio::test]
async fn test_consultant_returns_ordered_steps() {
    let retriever = FixedRetriever::new("Source: malicious_ip.md\n\n1. Block\n2. Hunt");
    let reasoner = ScriptedReasoner::new(vec![json!({
        "found": true,
        "steps": ["Block the IP at the perimeter", "Hunt for other hosts contacting it"]
    })]);
    let step = ConsultantStep::new(retriever, reasoner.clone());

    let update = step
        .execute(&with_intel(state("198.51.100.10", ""), true))
        .await
        .unwrap();

    match update {
        PartialUpdate::Playbook { steps, trace } => {
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0], "Block the IP at the perimeter");
            assert_eq!(trace, "Consultant Agent conclusion: playbook procedure found.");
        }
        other => panic!("unexpected update {other:?}"),
    }
    assert!(reasoner.last_user_prompt().contains("Context from Playbooks"));
}

#[tokio::test]
async fn test_consultant_summary_falls_back_to_trace() {
    let blank = state("", "");
    assert_eq!(ConsultantStep::incident_summary(&blank), "");

    let benign = with_intel(state("203.0.113.7", ""), false);
    assert!(ConsultantStep::incident_summary(&benign).starts_with("Threat Intel Summary"));
}

#[tokio::test]
async fn test_policy_generates_block_rule() {
    let reasoner = ScriptedReasoner::new(vec![json!({
        "name": "Block-Malicious-IP-198.51.100.10",
        "action": "BLOCK",
        "source_ip": "198.51.100.10",
        "protocol": "ANY"
    })]);
    let step = PolicyStep::new(reasoner.clone());

    let update = step
        .execute(&with_intel(state("198.51.100.10", ""), true))
        .await
        .unwrap();

    match update {
        PartialUpdate::Policy { policy, trace } => {
            assert_eq!(policy.action, RuleAction::Block);
            assert_eq!(policy.protocol, Protocol::Any);
            assert_eq!(
                trace,
                "Policy Agent conclusion: generated rule 'Block-Malicious-IP-198.51.100.10'."
            );
        }
        other => panic!("unexpected update {other:?}"),
    }
    let prompt = reasoner.last_user_prompt();
    assert!(prompt.contains("Indicator: 198.51.100.10"));
    assert!(prompt.contains("is malicious."));
}

#[tokio::test]
async fn test_policy_rejects_out_of_enum_action() {
    let reasoner = ScriptedReasoner::new(vec![json!({
        "name": "Drop-It",
        "action": "DROP",
        "source_ip": "198.51.100.10",
        "protocol": "ANY"
    })]);
    let step = PolicyStep::new(reasoner);

    let err = step
        .execute(&with_intel(state("198.51.100.10", ""), true))
        .await
        .unwrap_err();
    assert!(matches!(err, VigilError::Classification(_)));
}

#[tokio::test]
async fn test_policy_rejects_empty_source_ip() {
    let reasoner = ScriptedReasoner::new(vec![json!({
        "name": "Block-Something",
        "action": "BLOCK",
        "source_ip": " ",
        "protocol": "TCP"
    })]);
    let step = PolicyStep::new(reasoner);

    let err = step.execute(&state("", "logs")).await.unwrap_err();
    assert!(matches!(err, VigilError::Classification(_)));
}
