//! Types for the runner module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a process that exited on its own.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Last lines of stdout.
    pub stdout_tail: String,
    /// Last lines of stderr.
    pub stderr_tail: String,
    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
}

/// Inputs and output of one face swap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    pub job_id: Uuid,
    pub source: PathBuf,
    pub target: PathBuf,
    pub output: PathBuf,
}

/// Status of the pipeline pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name.
    pub name: String,
    /// Runs holding a permit.
    pub active_jobs: usize,
    /// Maximum concurrent runs.
    pub max_concurrent: usize,
    /// Runs waiting for a permit.
    pub queued_jobs: usize,
    /// Successful runs since startup.
    pub total_processed: u64,
    /// Failed runs since startup.
    pub total_failed: u64,
}
