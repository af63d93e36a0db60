//! Types for the dependency provisioner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A model file fetched over HTTP into the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    pub url: String,
    pub path: PathBuf,
    pub min_size_bytes: u64,
    /// Lowercase hex SHA-256.
    pub sha256: Option<String>,
    pub download_timeout: Duration,
}

/// Runtime packages managed through the package tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSet {
    pub name: String,
    pub packages: Vec<String>,
    pub uninstall_first: Vec<String>,
    pub install_args: Vec<String>,
}

/// A heavyweight dependency that must be present before jobs run.
#[derive(Debug, Clone, PartialEq)]
pub enum Dependency {
    Model(ModelArtifact),
    Packages(PackageSet),
}

impl Dependency {
    pub fn name(&self) -> &str {
        match self {
            Self::Model(m) => &m.name,
            Self::Packages(p) => &p.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(_) => "model",
            Self::Packages(_) => "packages",
        }
    }
}

/// Successful outcome of `ensure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Confirmed earlier in this process; nothing was checked.
    Cached,
    /// Presence check passed; nothing was installed.
    AlreadyPresent,
    /// Installed and verified by this call.
    Installed,
}

/// Last known state of a dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DependencyStatus {
    Unknown,
    Ready { checked_at: DateTime<Utc> },
    Failed { reason: String, checked_at: DateTime<Utc> },
}

impl DependencyStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// One dependency's entry in a [`ProvisionSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub name: String,
    pub kind: String,
    /// True while a check or install holds the dependency's lock.
    pub in_progress: bool,
    #[serde(flatten)]
    pub status: DependencyStatus,
}

/// Point-in-time view of every configured dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionSnapshot {
    pub all_ready: bool,
    pub dependencies: Vec<DependencySnapshot>,
}

/// Structured progress reported while provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisionEvent {
    Checking {
        dependency: String,
    },
    Installing {
        dependency: String,
    },
    DownloadProgress {
        dependency: String,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    Ready {
        dependency: String,
        readiness: Readiness,
    },
    Failed {
        dependency: String,
        reason: String,
    },
}

/// Callback receiving provisioning events.
pub type ProvisionEventCallback = Arc<dyn Fn(&ProvisionEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_name_and_kind() {
        let dep = Dependency::Packages(PackageSet {
            name: "torch".to_string(),
            packages: vec!["torch".to_string()],
            uninstall_first: vec![],
            install_args: vec![],
        });
        assert_eq!(dep.name(), "torch");
        assert_eq!(dep.kind(), "packages");
    }

    #[test]
    fn test_status_serialization() {
        let status = DependencyStatus::Failed {
            reason: "pip exited with code 1".to_string(),
            checked_at: Utc::now(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "pip exited with code 1");
    }

    #[test]
    fn test_snapshot_flattens_status() {
        let snapshot = DependencySnapshot {
            name: "inswapper_128".to_string(),
            kind: "model".to_string(),
            in_progress: false,
            status: DependencyStatus::Unknown,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "unknown");
        assert_eq!(json["name"], "inswapper_128");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProvisionEvent::Ready {
            dependency: "torch".to_string(),
            readiness: Readiness::Installed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ready");
        assert_eq!(json["readiness"], "installed");
    }
}
