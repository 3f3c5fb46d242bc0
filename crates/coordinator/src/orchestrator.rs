//! The orchestration loop: decide, dispatch, merge.

use crate::routing::RoutingFacts;
use crate::supervisor::Supervisor;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vigil_common::{
    Decision, HaltReason, InvestigationEvent, InvestigationRequest, InvestigationState, Outcome,
    Result, Step, VigilError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on supervisor decisions per investigation
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Deadline for a single step invocation
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
}

fn default_max_steps() -> usize {
    25
}

fn default_step_timeout_ms() -> u64 {
    60_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            step_timeout_ms: default_step_timeout_ms(),
        }
    }
}

/// Maps each decision to the step that handles it.
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<Decision, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under its own decision, replacing any previous one.
    pub fn register(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.insert(step.decision(), step);
        self
    }

    pub fn get(&self, decision: Decision) -> Option<&Arc<dyn Step>> {
        self.steps.get(&decision)
    }

    pub fn contains(&self, decision: Decision) -> bool {
        self.steps.contains_key(&decision)
    }
}

/// Cooperative cancellation flag, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs investigations. Holds no per-investigation state, so one instance can
/// serve many concurrent runs.
pub struct Orchestrator {
    supervisor: Supervisor,
    registry: StepRegistry,
    max_steps: usize,
    step_timeout: Duration,
}

impl Orchestrator {
    /// Fails with a configuration error if the supervisor's table can reach a
    /// decision that has no registered step.
    pub fn new(
        supervisor: Supervisor,
        registry: StepRegistry,
        config: &OrchestratorConfig,
    ) -> Result<Self> {
        let mut missing: Vec<&str> = supervisor
            .table()
            .decisions()
            .into_iter()
            .filter(|d| !d.is_terminal() && !registry.contains(*d))
            .map(Decision::label)
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(VigilError::Configuration(format!(
                "table '{}' routes to decisions with no registered step: {}",
                supervisor.table().name(),
                missing.join(", ")
            )));
        }

        info!(
            table = supervisor.table().name(),
            mode = ?supervisor.mode(),
            max_steps = config.max_steps,
            step_timeout_ms = config.step_timeout_ms,
            "Orchestrator ready"
        );

        Ok(Self {
            supervisor,
            registry,
            max_steps: config.max_steps,
            step_timeout: Duration::from_millis(config.step_timeout_ms),
        })
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run one investigation to completion and collect its events.
    pub async fn investigate(
        &self,
        request: InvestigationRequest,
    ) -> (Vec<InvestigationEvent>, Outcome) {
        // At most one event per iteration plus the terminal one
        let (tx, mut rx) = mpsc::channel(self.max_steps + 1);
        let outcome = self
            .run(InvestigationState::new(request), &tx, &CancelToken::new())
            .await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (events, outcome)
    }

    /// Drive `state` until the supervisor ends it, a step fails, the budget
    /// runs out, the run stalls, or `cancel` fires. Every iteration emits one
    /// event on `events`, followed by exactly one terminal event.
    pub async fn run(
        &self,
        mut state: InvestigationState,
        events: &mpsc::Sender<InvestigationEvent>,
        cancel: &CancelToken,
    ) -> Outcome {
        info!(investigation = %state.id(), table = self.supervisor.table().name(), "Investigation started");
        let mut dispatched: HashSet<(RoutingFacts, Decision)> = HashSet::new();

        for iteration in 1..=self.max_steps {
            if cancel.is_cancelled() {
                return self.halt(state, HaltReason::Cancelled, events).await;
            }

            let decision = match self.supervisor.decide(&state).await {
                Ok(decision) => decision,
                Err(e) => return self.fail(state, None, e, events).await,
            };
            state.record_decision(decision);
            debug!(investigation = %state.id(), iteration, decision = %decision, "Supervisor decided");

            if decision.is_terminal() {
                info!(investigation = %state.id(), iterations = iteration, "Investigation finished");
                let outcome = Outcome::Finished { final_state: state };
                emit(events, outcome.to_event()).await;
                return outcome;
            }

            // Only a step that changed nothing can lead back to the same pair
            let facts = RoutingFacts::from_state(&state);
            if !dispatched.insert((facts, decision)) {
                warn!(investigation = %state.id(), decision = %decision, "No progress since last dispatch");
                return self.halt(state, HaltReason::Stalled, events).await;
            }

            let Some(step) = self.registry.get(decision) else {
                let e = VigilError::Configuration(format!("no step registered for {decision}"));
                return self.fail(state, Some(decision), e, events).await;
            };

            info!(investigation = %state.id(), iteration, step = step.name(), "Dispatching step");
            let update = match tokio::time::timeout(self.step_timeout, step.execute(&state)).await {
                Ok(Ok(update)) => update,
                Ok(Err(e)) => return self.fail(state, Some(decision), e, events).await,
                Err(_) => {
                    let e = VigilError::Timeout(self.step_timeout.as_millis() as u64);
                    return self.fail(state, Some(decision), e, events).await;
                }
            };

            let updated_fields = match state.apply(decision, update.clone()) {
                Ok(fields) => fields,
                Err(e) => return self.fail(state, Some(decision), e, events).await,
            };
            debug!(investigation = %state.id(), fields = ?updated_fields, trace_len = state.trace().len(), "Merged update");

            emit(
                events,
                InvestigationEvent::Step {
                    iteration,
                    decision,
                    updated_fields,
                    update,
                },
            )
            .await;
        }

        self.halt(state, HaltReason::StepBudgetExhausted, events).await
    }

    async fn halt(
        &self,
        state: InvestigationState,
        reason: HaltReason,
        events: &mpsc::Sender<InvestigationEvent>,
    ) -> Outcome {
        info!(investigation = %state.id(), reason = %reason, "Investigation halted");
        let outcome = Outcome::Halted {
            reason,
            final_state: state,
        };
        emit(events, outcome.to_event()).await;
        outcome
    }

    async fn fail(
        &self,
        state: InvestigationState,
        decision: Option<Decision>,
        e: VigilError,
        events: &mpsc::Sender<InvestigationEvent>,
    ) -> Outcome {
        error!(
            investigation = %state.id(),
            decision = ?decision,
            kind = ?e.kind(),
            error = %e,
            "Investigation failed"
        );
        let outcome = Outcome::Failed {
            decision,
            kind: e.kind(),
            error: e.to_string(),
            final_state: state,
        };
        emit(events, outcome.to_event()).await;
        outcome
    }
}

async fn emit(events: &mpsc::Sender<InvestigationEvent>, event: InvestigationEvent) {
    if events.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RuleTable;

    #[test]
    fn config_defaults() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_steps, 25);
        assert_eq!(config.step_timeout_ms, 60_000);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn missing_steps_fail_assembly() {
        let result = Orchestrator::new(
            Supervisor::new(RuleTable::fast_track()),
            StepRegistry::new(),
            &OrchestratorConfig::default(),
        );
        match result {
            Err(VigilError::Configuration(msg)) => {
                assert!(msg.contains("Threat_Analyst"));
                assert!(msg.contains("Policy_Agent"));
                assert!(!msg.contains("Consultant_Agent"));
            }
            _ => panic!("expected a configuration error"),
        }
    }
}
