//! Assembles an [`Orchestrator`] from configuration.
//!
//! Collaborators are built once here and injected; nothing is global.

use crate::config::VigilConfig;
use crate::orchestrator::{Orchestrator, StepRegistry};
use crate::routing::RuleTable;
use crate::supervisor::{Supervisor, SupervisorMode};
use std::sync::Arc;
use tracing::info;
use vigil_agents::{
    ConsultantStep, LogAnalystStep, PolicyStep, ReputationLookup, ThreatAnalystStep,
    VirusTotalClient,
};
use vigil_common::{Result, VigilError};
use vigil_llm::{LlmReasoner, Reasoner, build_llm_client};
use vigil_playbooks::{KeywordRetriever, PlaybookLibrary, PlaybookRetriever};

/// The collaborators every step set is built from.
pub struct Collaborators {
    pub reasoner: Arc<dyn Reasoner>,
    pub reputation: Arc<dyn ReputationLookup>,
    pub retriever: Arc<dyn PlaybookRetriever>,
}

/// Register the four specialist steps over the given collaborators.
pub fn default_registry(collaborators: &Collaborators) -> StepRegistry {
    StepRegistry::new()
        .register(Arc::new(ThreatAnalystStep::new(
            collaborators.reputation.clone(),
            collaborators.reasoner.clone(),
        )))
        .register(Arc::new(LogAnalystStep::new(collaborators.reasoner.clone())))
        .register(Arc::new(ConsultantStep::new(
            collaborators.retriever.clone(),
            collaborators.reasoner.clone(),
        )))
        .register(Arc::new(PolicyStep::new(collaborators.reasoner.clone())))
}

/// Build the orchestrator from explicit collaborators, honouring the
/// supervisor and orchestrator sections of `config`.
pub fn build_with(config: &VigilConfig, collaborators: Collaborators) -> Result<Orchestrator> {
    let table = RuleTable::from_kind(config.supervisor.table);
    let supervisor = match config.supervisor.mode {
        SupervisorMode::Rules => Supervisor::new(table),
        SupervisorMode::Reasoner => {
            Supervisor::with_reasoner(table, collaborators.reasoner.clone())
        }
    };
    Orchestrator::new(
        supervisor,
        default_registry(&collaborators),
        &config.orchestrator,
    )
}

/// Build the production orchestrator: LLM reasoner, VirusTotal lookups and the
/// on-disk playbook library.
///
/// Missing credentials fail here with a configuration error, before any
/// investigation starts.
pub fn build_orchestrator(config: &VigilConfig) -> Result<Orchestrator> {
    let client = build_llm_client(&config.llm)?;
    let reasoner: Arc<dyn Reasoner> = Arc::new(
        LlmReasoner::new(client)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens),
    );

    let virustotal = VirusTotalClient::new(&config.reputation)?;
    if !virustotal.has_credentials() {
        return Err(VigilError::Configuration(
            "reputation lookups need an API key: set reputation.api_key or VT_API_KEY".into(),
        ));
    }

    let library = Arc::new(PlaybookLibrary::load(&config.playbooks)?);
    let retriever = KeywordRetriever::new(library, config.playbooks.max_context_tokens);

    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        mode = ?config.supervisor.mode,
        table = ?config.supervisor.table,
        "Assembling orchestrator"
    );

    build_with(
        config,
        Collaborators {
            reasoner,
            reputation: Arc::new(virustotal),
            retriever: Arc::new(retriever),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_agents::ReputationConfig;
    use vigil_llm::{LlmConfig, Provider};

    #[test]
    fn missing_reputation_key_is_configuration_error() {
        let config = VigilConfig {
            llm: LlmConfig {
                provider: Provider::Ollama,
                ..Default::default()
            },
            reputation: ReputationConfig {
                api_key: Some(String::new()),
                api_url: "http://127.0.0.1:9".into(),
                timeout_ms: 100,
            },
            ..Default::default()
        };
        // Only meaningful when the environment does not provide a key
        if std::env::var("VT_API_KEY").is_err() {
            let err = build_orchestrator(&config).err().unwrap();
            assert!(matches!(err, VigilError::Configuration(_)));
        }
    }

    #[test]
    fn keys_in_config_assemble() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = VigilConfig::default();
        config.llm.provider = Provider::Ollama;
        config.reputation.api_key = Some("vt-test".into());
        config.playbooks.dir = dir.path().to_path_buf();

        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.supervisor().table().name(), "fast_track");
    }
}
