use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::fetcher::FetcherConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::provisioner::ProvisionerConfig;
use crate::runner::PipelineConfig;
use crate::workspace::{OutputLayout, WorkspaceConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Sanitized config for API responses.
///
/// Query strings of download URLs may carry access tokens, and pipeline
/// environment values may carry credentials, so neither is echoed.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub workspace: SanitizedWorkspaceConfig,
    pub provisioner: SanitizedProvisionerConfig,
    pub fetcher: FetcherConfig,
    pub pipeline: SanitizedPipelineConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedWorkspaceConfig {
    pub root: PathBuf,
    pub output_layout: OutputLayout,
    pub keep_inputs: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProvisionerConfig {
    pub provision_on_startup: bool,
    pub model_name: String,
    pub model_url: String,
    pub model_checksum_configured: bool,
    pub min_model_size_bytes: u64,
    pub package_sets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPipelineConfig {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub execution_provider: String,
    pub frame_processor: String,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub inherit_env: Vec<String>,
    /// Names of explicitly set environment variables (values hidden).
    pub env_keys: Vec<String>,
}

fn strip_query(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or(url).to_string()
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            workspace: SanitizedWorkspaceConfig {
                root: config.workspace.root.clone(),
                output_layout: config.workspace.output_layout,
                keep_inputs: config.workspace.keep_inputs,
            },
            provisioner: SanitizedProvisionerConfig {
                provision_on_startup: config.provisioner.provision_on_startup,
                model_name: config.provisioner.model.name.clone(),
                model_url: strip_query(&config.provisioner.model.url),
                model_checksum_configured: config.provisioner.model.sha256.is_some(),
                min_model_size_bytes: config.provisioner.model.min_size_bytes,
                package_sets: config
                    .provisioner
                    .packages
                    .iter()
                    .map(|p| p.name.clone())
                    .collect(),
            },
            fetcher: config.fetcher.clone(),
            pipeline: SanitizedPipelineConfig {
                interpreter: config.pipeline.interpreter.clone(),
                script: config.pipeline.script.clone(),
                execution_provider: config.pipeline.execution_provider.clone(),
                frame_processor: config.pipeline.frame_processor.clone(),
                timeout_secs: config.pipeline.timeout_secs,
                max_concurrent: config.pipeline.max_concurrent,
                inherit_env: config.pipeline.inherit_env.clone(),
                env_keys: config.pipeline.env.keys().cloned().collect(),
            },
            orchestrator: config.orchestrator.clone(),
        }
    }
}
