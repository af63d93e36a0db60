//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the swap orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound for one whole job (provisioning, fetches and pipeline).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Run the provisioning check before each job.
    /// Satisfied dependencies are cached, so this costs a lock per dependency.
    #[serde(default = "default_true")]
    pub provision_before_jobs: bool,
}

fn default_request_timeout() -> u64 {
    7200 // 2 hours
}

fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            provision_before_jobs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.request_timeout_secs, 7200);
        assert!(config.provision_before_jobs);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrchestratorConfig = toml::from_str("request_timeout_secs = 60").unwrap();
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.provision_before_jobs);
    }
}
