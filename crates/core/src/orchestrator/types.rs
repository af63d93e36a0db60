//! Types for the swap orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::fetcher::{AssetReference, FetchError};
use crate::provisioner::{ProvisionError, Readiness};
use crate::runner::RunnerError;

/// Inbound request: where to get the face and the video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub source_url: String,
    pub target_url: String,
}

impl SwapRequest {
    pub fn new(source_url: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            target_url: target_url.into(),
        }
    }
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Provisioning,
    Fetching,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Fetching => "fetching",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request's unit of work. Lives only as long as the request.
#[derive(Debug, Clone)]
pub struct SwapJob {
    pub id: Uuid,
    pub source: AssetReference,
    pub target: AssetReference,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub failure: Option<SwapError>,
    pub created_at: DateTime<Utc>,
}

/// A finished job.
#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub job_id: Uuid,
    pub output_path: PathBuf,
    pub elapsed_ms: u64,
}

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapErrorKind {
    InvalidReference,
    FetchFailed,
    ProvisionFailed,
    SpawnError,
    Timeout,
    PipelineError,
}

impl SwapErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidReference => "invalid_reference",
            Self::FetchFailed => "fetch_failed",
            Self::ProvisionFailed => "provision_failed",
            Self::SpawnError => "spawn_error",
            Self::Timeout => "timeout",
            Self::PipelineError => "pipeline_error",
        }
    }

    /// True when no job can succeed until an operator intervenes.
    pub fn is_service_level(&self) -> bool {
        matches!(self, Self::ProvisionFailed | Self::SpawnError)
    }
}

impl fmt::Display for SwapErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed job: what went wrong and in which stage.
#[derive(Debug, Clone, Error)]
#[error("{kind} during {stage}: {message}")]
pub struct SwapError {
    pub job_id: Uuid,
    pub kind: SwapErrorKind,
    pub stage: JobStatus,
    pub message: String,
    /// Captured stderr of the pipeline, when it ran.
    pub detail: Option<String>,
}

impl SwapError {
    pub fn new(
        job_id: Uuid,
        kind: SwapErrorKind,
        stage: JobStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            kind,
            stage,
            message: message.into(),
            detail: None,
        }
    }

    pub fn from_fetch(job_id: Uuid, stage: JobStatus, err: &FetchError) -> Self {
        let kind = if err.is_invalid_reference() {
            SwapErrorKind::InvalidReference
        } else {
            SwapErrorKind::FetchFailed
        };
        Self::new(job_id, kind, stage, err.to_string())
    }

    pub fn from_provision(job_id: Uuid, err: &ProvisionError) -> Self {
        Self::new(
            job_id,
            SwapErrorKind::ProvisionFailed,
            JobStatus::Provisioning,
            err.to_string(),
        )
    }

    pub fn from_runner(job_id: Uuid, err: &RunnerError) -> Self {
        let kind = match err {
            RunnerError::Spawn { .. } => SwapErrorKind::SpawnError,
            RunnerError::Timeout { .. } => SwapErrorKind::Timeout,
            RunnerError::Failed { .. } | RunnerError::MissingOutput { .. } | RunnerError::Io(_) => {
                SwapErrorKind::PipelineError
            }
        };
        Self {
            detail: err.stderr_tail().filter(|s| !s.is_empty()).map(String::from),
            ..Self::new(job_id, kind, JobStatus::Running, err.to_string())
        }
    }
}

/// Events emitted while a job runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapEvent {
    Accepted {
        job_id: Uuid,
    },
    StageChanged {
        job_id: Uuid,
        status: JobStatus,
    },
    DependencyReady {
        job_id: Uuid,
        dependency: String,
        readiness: Readiness,
    },
    Completed {
        job_id: Uuid,
        output_path: PathBuf,
        elapsed_ms: u64,
    },
    Failed {
        job_id: Uuid,
        kind: SwapErrorKind,
        stage: JobStatus,
        message: String,
    },
}

/// Callback for swap events.
pub type SwapEventCallback = Arc<dyn Fn(&SwapEvent) + Send + Sync>;

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Jobs not yet finished.
    pub running_jobs: usize,
    pub pending_count: usize,
    pub provisioning_count: usize,
    pub fetching_count: usize,
    pub running_count: usize,
    /// Finished jobs since startup.
    pub total_succeeded: u64,
    pub total_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_service_level_kinds() {
        assert!(SwapErrorKind::ProvisionFailed.is_service_level());
        assert!(SwapErrorKind::SpawnError.is_service_level());
        for kind in [
            SwapErrorKind::InvalidReference,
            SwapErrorKind::FetchFailed,
            SwapErrorKind::Timeout,
            SwapErrorKind::PipelineError,
        ] {
            assert!(!kind.is_service_level(), "{kind}");
        }
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&SwapErrorKind::InvalidReference).unwrap(),
            "\"invalid_reference\""
        );
        assert_eq!(SwapErrorKind::FetchFailed.to_string(), "fetch_failed");
    }

    #[test]
    fn test_from_fetch() {
        let id = Uuid::new_v4();
        let err = SwapError::from_fetch(
            id,
            JobStatus::Fetching,
            &FetchError::invalid_reference("x", "bad"),
        );
        assert_eq!(err.kind, SwapErrorKind::InvalidReference);

        let err = SwapError::from_fetch(id, JobStatus::Fetching, &FetchError::Empty);
        assert_eq!(err.kind, SwapErrorKind::FetchFailed);
        assert_eq!(err.to_string(), "fetch_failed during fetching: asset is empty");
    }

    #[test]
    fn test_from_runner() {
        let id = Uuid::new_v4();
        let err = SwapError::from_runner(
            id,
            &RunnerError::Failed {
                exit_code: Some(1),
                stderr_tail: "No face detected".to_string(),
            },
        );
        assert_eq!(err.kind, SwapErrorKind::PipelineError);
        assert_eq!(err.stage, JobStatus::Running);
        assert_eq!(err.detail.as_deref(), Some("No face detected"));

        let err = SwapError::from_runner(
            id,
            &RunnerError::Timeout {
                timeout: Duration::from_secs(1),
                stderr_tail: String::new(),
            },
        );
        assert_eq!(err.kind, SwapErrorKind::Timeout);
        assert!(err.detail.is_none());

        let err = SwapError::from_runner(
            id,
            &RunnerError::MissingOutput {
                path: PathBuf::from("/o.mp4"),
            },
        );
        assert_eq!(err.kind, SwapErrorKind::PipelineError);
    }

    #[test]
    fn test_event_serialization() {
        let event = SwapEvent::StageChanged {
            job_id: Uuid::nil(),
            status: JobStatus::Fetching,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stage_changed");
        assert_eq!(json["status"], "fetching");
    }

    #[test]
    fn test_terminal_status() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
