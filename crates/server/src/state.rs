use std::sync::Arc;
use faceswap_core::{Config, Provisioner, SanitizedConfig, SwapOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<SwapOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<SwapOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<SwapOrchestrator> {
        &self.orchestrator
    }

    /// The provisioner shared with the orchestrator.
    pub fn provisioner(&self) -> &Arc<Provisioner> {
        self.orchestrator.provisioner()
    }
}
