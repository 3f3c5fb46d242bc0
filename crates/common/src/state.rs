//! Investigation state threaded through every step.
//!
//! The orchestration loop owns the only mutable copy. Steps see it through a
//! shared reference and hand back a [`PartialUpdate`]; [`InvestigationState::apply`]
//! is the single place where derived fields get written.

use crate::decision::Decision;
use crate::error::{Result, VigilError};
use crate::update::{PartialUpdate, StateField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The alert that triggered the investigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub details: String,
}

/// Verdict of the indicator intelligence step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatIntel {
    pub summary: String,
    pub is_malicious: bool,
}

/// Verdict of the log analysis step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAnalysis {
    pub summary: String,
    pub contains_anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleAction {
    Block,
    Allow,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
    Any,
}

/// A machine-readable firewall rule produced by the policy step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub action: RuleAction,
    pub source_ip: String,
    pub protocol: Protocol,
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {} {:?}",
            self.name, self.action, self.source_ip, self.protocol
        )
    }
}

/// An investigation request as submitted by a client. Every field is optional,
/// but without an indicator or logs there is little to investigate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestigationRequest {
    #[serde(default)]
    pub alert: Alert,
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub logs: Option<String>,
}

impl InvestigationRequest {
    pub fn new(indicator: impl Into<String>, logs: impl Into<String>) -> Self {
        Self {
            alert: Alert::default(),
            indicator: Some(indicator.into()),
            logs: Some(logs.into()),
        }
    }

    pub fn with_alert(mut self, source: impl Into<String>, details: impl Into<String>) -> Self {
        self.alert = Alert {
            source: source.into(),
            details: details.into(),
        };
        self
    }
}

/// The shared record of one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationState {
    id: String,
    created_at: DateTime<Utc>,
    alert: Alert,
    indicator: Option<String>,
    logs: Option<String>,
    intel: Option<ThreatIntel>,
    log_summary: Option<LogAnalysis>,
    playbook_steps: Option<Vec<String>>,
    policy: Option<FirewallRule>,
    investigation_trace: Vec<String>,
    next_decision: Option<Decision>,
}

impl InvestigationState {
    /// Create a fresh state. Blank indicator or log strings count as absent.
    pub fn new(request: InvestigationRequest) -> Self {
        Self {
            id: format!("inv_{}", uuid::Uuid::new_v4()),
            created_at: Utc::now(),
            alert: request.alert,
            indicator: non_blank(request.indicator),
            logs: non_blank(request.logs),
            intel: None,
            log_summary: None,
            playbook_steps: None,
            policy: None,
            investigation_trace: Vec::new(),
            next_decision: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn alert(&self) -> &Alert {
        &self.alert
    }

    pub fn indicator(&self) -> Option<&str> {
        self.indicator.as_deref()
    }

    pub fn logs(&self) -> Option<&str> {
        self.logs.as_deref()
    }

    pub fn intel(&self) -> Option<&ThreatIntel> {
        self.intel.as_ref()
    }

    pub fn log_summary(&self) -> Option<&LogAnalysis> {
        self.log_summary.as_ref()
    }

    pub fn playbook_steps(&self) -> Option<&[String]> {
        self.playbook_steps.as_deref()
    }

    pub fn policy(&self) -> Option<&FirewallRule> {
        self.policy.as_ref()
    }

    pub fn trace(&self) -> &[String] {
        &self.investigation_trace
    }

    pub fn next_decision(&self) -> Option<Decision> {
        self.next_decision
    }

    /// True when either verdict so far points at a threat.
    pub fn threat_detected(&self) -> bool {
        self.intel.as_ref().is_some_and(|i| i.is_malicious)
            || self.log_summary.as_ref().is_some_and(|l| l.contains_anomaly)
    }

    pub fn record_decision(&mut self, decision: Decision) {
        self.next_decision = Some(decision);
    }

    /// Merge a step's update produced for `decision`.
    ///
    /// Rejects updates written by the wrong step and writes to fields that are
    /// already present. On error the state is left untouched.
    pub fn apply(&mut self, decision: Decision, update: PartialUpdate) -> Result<Vec<StateField>> {
        if let Some(owner) = update.owner() {
            if owner != decision {
                return Err(VigilError::InvalidUpdate(format!(
                    "step for {decision} returned fields owned by {owner}"
                )));
            }
        }

        let fields = update.fields();
        match update {
            PartialUpdate::Empty => {}
            PartialUpdate::Intel { intel, trace } => {
                ensure_absent(self.intel.is_some(), StateField::Intel)?;
                self.intel = Some(intel);
                self.investigation_trace.push(trace);
            }
            PartialUpdate::LogAnalysis { log_summary, trace } => {
                ensure_absent(self.log_summary.is_some(), StateField::LogSummary)?;
                self.log_summary = Some(log_summary);
                self.investigation_trace.push(trace);
            }
            PartialUpdate::Playbook { steps, trace } => {
                ensure_absent(self.playbook_steps.is_some(), StateField::PlaybookSteps)?;
                self.playbook_steps = Some(steps);
                self.investigation_trace.push(trace);
            }
            PartialUpdate::Policy { policy, trace } => {
                ensure_absent(self.policy.is_some(), StateField::Policy)?;
                self.policy = Some(policy);
                self.investigation_trace.push(trace);
            }
        }
        Ok(fields)
    }
}

fn ensure_absent(present: bool, field: StateField) -> Result<()> {
    if present {
        return Err(VigilError::InvalidUpdate(format!(
            "{field:?} is already set and is written at most once"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
