//! Error types for the provisioner module.

use std::path::PathBuf;
use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while ensuring a dependency.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Package tool (pip) not found.
    #[error("package tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Model download failed.
    #[error("download of {dependency} failed: {source}")]
    Download {
        dependency: String,
        #[source]
        source: DownloadError,
    },

    /// Install command exited non-zero.
    #[error("install of {dependency} failed: {reason}")]
    InstallFailed {
        dependency: String,
        reason: String,
        stderr: Option<String>,
    },

    /// Dependency still absent after install.
    #[error("{dependency} failed verification: {reason}")]
    VerificationFailed { dependency: String, reason: String },

    /// External command did not finish in time.
    #[error("{dependency}: {action} timed out after {timeout_secs} seconds")]
    Timeout {
        dependency: String,
        action: String,
        timeout_secs: u64,
    },

    /// A previous attempt failed and has not been invalidated.
    #[error("{dependency} previously failed: {reason}")]
    PreviouslyFailed { dependency: String, reason: String },

    /// No dependency with this name is configured.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// Background provisioning task panicked or was aborted.
    #[error("provisioning task for {dependency} did not complete")]
    TaskAborted { dependency: String },

    /// I/O error while checking or installing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Creates an install failed error with captured stderr.
    pub fn install_failed(
        dependency: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::InstallFailed {
            dependency: dependency.into(),
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a verification failed error.
    pub fn verification_failed(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(dependency: impl Into<String>, action: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            dependency: dependency.into(),
            action: action.into(),
            timeout_secs,
        }
    }
}
