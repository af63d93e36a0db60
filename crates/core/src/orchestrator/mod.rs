//! Swap orchestrator.
//!
//! One request becomes one [`SwapJob`]:
//! - **Validate**: both links must resolve to a known provider
//! - **Provision**: dependencies are ensured (cached after the first job)
//! - **Fetch**: source and target download concurrently into the job directory
//! - **Run**: the external pipeline produces the output video
//!
//! Any failure ends the job with a [`SwapError`] naming the stage and kind.

mod config;
mod service;
mod types;

pub use config::OrchestratorConfig;
pub use service::SwapOrchestrator;
pub use types::{
    JobStatus, OrchestratorStatus, SwapError, SwapErrorKind, SwapEvent, SwapEventCallback,
    SwapJob, SwapOutcome, SwapRequest,
};
