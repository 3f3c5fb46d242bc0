//! Configuration for Vigil.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Warns about API keys stored in config files

use crate::orchestrator::OrchestratorConfig;
use crate::routing::TableKind;
use crate::supervisor::SupervisorMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;
use vigil_agents::ReputationConfig;
use vigil_llm::LlmConfig;
use vigil_playbooks::PlaybookConfig;

/// Top-level configuration, one TOML table per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub llm: LlmConfig,
    pub supervisor: SupervisorConfig,
    pub orchestrator: OrchestratorConfig,
    pub reputation: ReputationConfig,
    pub playbooks: PlaybookConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// `rules` or `reasoner`
    pub mode: SupervisorMode,

    /// `fast_track` or `consultative`
    pub table: TableKind,
}

impl VigilConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix systems the file must be a regular file, must not be
    /// world-writable, and must not be world-readable if it holds an API key.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.llm.api_key.is_some() || config.reputation.api_key.is_some() {
            warn!(
                path = %path.display(),
                "API key found in config file. Prefer environment variables \
                 (GROQ_API_KEY, OPENAI_API_KEY, VT_API_KEY)."
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {e}", path.display()))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {mode:04o}). Fix with: chmod o-w {}",
            path.display(),
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("api_key") && !line.starts_with('#'));

    if has_api_key && mode & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {mode:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            path.display()
        );
    }
    if has_api_key && mode & 0o040 != 0 {
        warn!(
            path = %path.display(),
            mode = %format!("{mode:04o}"),
            "Config file contains an API key and is group-readable"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vigil_llm::Provider;

    const FULL_CONFIG: &str = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.0

[supervisor]
mode = "reasoner"
table = "consultative"

[orchestrator]
max_steps = 10
step_timeout_ms = 5000

[reputation]
timeout_ms = 2000

[playbooks]
dir = "/srv/playbooks"
chunk_size = 800
"#;

    #[test]
    fn parses_every_section() {
        let config: VigilConfig = toml::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.supervisor.mode, SupervisorMode::Reasoner);
        assert_eq!(config.supervisor.table, TableKind::Consultative);
        assert_eq!(config.orchestrator.max_steps, 10);
        assert_eq!(config.reputation.timeout_ms, 2000);
        assert_eq!(config.playbooks.chunk_size, 800);
        assert_eq!(config.playbooks.chunk_overlap, 50);
    }

    #[test]
    fn empty_file_is_fast_track_rules() {
        let config: VigilConfig = toml::from_str("").unwrap();
        assert_eq!(config.supervisor.mode, SupervisorMode::Rules);
        assert_eq!(config.supervisor.table, TableKind::FastTrack);
        assert_eq!(config.orchestrator.max_steps, 25);
        assert_eq!(config.llm.model, vigil_llm::DEFAULT_MODEL);
    }

    #[test]
    fn unknown_table_is_rejected() {
        assert!(toml::from_str::<VigilConfig>("[supervisor]\ntable = \"yolo\"").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_key_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\napi_key = \"gsk-secret\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(VigilConfig::from_file(file.path()).is_err());

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        let config = VigilConfig::from_file(file.path()).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk-secret"));
    }

    #[cfg(unix)]
    #[test]
    fn world_writable_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nmax_steps = 5").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o666)).unwrap();
        assert!(VigilConfig::from_file(file.path()).is_err());
    }
}
