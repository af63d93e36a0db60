pub mod config;
pub mod download;
pub mod fetcher;
pub mod metrics;
pub mod orchestrator;
pub mod provisioner;
pub mod runner;
pub mod testing;
pub mod workspace;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use fetcher::{AssetFetcher, AssetReference, FetchError, FetcherConfig, HttpFetcher};
pub use orchestrator::{
    JobStatus, OrchestratorConfig, OrchestratorStatus, SwapError, SwapErrorKind, SwapEvent,
    SwapEventCallback, SwapOrchestrator, SwapOutcome, SwapRequest,
};
pub use provisioner::{
    DependencyBackend, ProvisionError, ProvisionSnapshot, ProvisionState, Provisioner,
    ProvisionerConfig, SystemBackend,
};
pub use runner::{FaceSwapPipeline, PipelineConfig, PipelineRunner, RunnerError};
pub use workspace::{OutputLayout, Workspace, WorkspaceConfig};
