//! Error types for the runner module.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from running an external process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The process could not be started.
    #[error("failed to start {}: {reason}", program.display())]
    Spawn { program: PathBuf, reason: String },

    /// The process ran past its timeout and was killed.
    #[error("process timed out after {}s", timeout.as_secs_f64())]
    Timeout { timeout: Duration, stderr_tail: String },

    /// The process exited unsuccessfully.
    #[error("process exited with {}: {}", describe_exit(*exit_code), last_line(stderr_tail))]
    Failed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    /// The process exited 0 but did not produce its output.
    #[error("process succeeded but produced no output at {}", path.display())]
    MissingOutput { path: PathBuf },

    /// I/O error around the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }

    /// Captured stderr tail, when the process got far enough to produce one.
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            Self::Timeout { stderr_tail, .. } | Self::Failed { stderr_tail, .. } => {
                Some(stderr_tail)
            }
            _ => None,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

fn last_line(tail: &str) -> &str {
    tail.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no stderr output")
}
