//! Application state for the API server.

use std::sync::Arc;
use vigil_coordinator::{Orchestrator, VigilConfig, build_orchestrator};

/// Shared application state for the API server.
pub struct AppState {
    /// Serves every investigation; holds no per-run state
    pub orchestrator: Arc<Orchestrator>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            start_time: std::time::Instant::now(),
        }
    }

    /// Assemble the production orchestrator from configuration.
    pub fn from_config(config: &VigilConfig) -> vigil_common::Result<Self> {
        Ok(Self::new(build_orchestrator(config)?))
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
