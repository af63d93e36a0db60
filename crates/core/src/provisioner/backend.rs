//! Presence checks and install actions behind a trait.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::config::ProvisionerConfig;
use super::error::ProvisionError;
use super::model::{check_model_file, download_model};
use super::packages::PipTool;
use super::types::{Dependency, ProvisionEventCallback};

/// Performs the side-effecting half of provisioning.
///
/// The [`Provisioner`](super::Provisioner) owns sequencing, locking and
/// caching; a backend only answers "is it there?" and "put it there".
#[async_trait]
pub trait DependencyBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Presence check. Must not modify anything.
    async fn is_present(&self, dependency: &Dependency) -> Result<bool, ProvisionError>;

    /// Install or download action.
    async fn install(
        &self,
        dependency: &Dependency,
        events: Option<&ProvisionEventCallback>,
    ) -> Result<(), ProvisionError>;
}

/// Backend that downloads models over HTTP and manages packages with pip.
pub struct SystemBackend {
    client: Client,
    pip: PipTool,
}

impl SystemBackend {
    pub fn new(config: &ProvisionerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            pip: PipTool::new(
                &config.pip_command,
                Duration::from_secs(config.query_timeout_secs),
                Duration::from_secs(config.install_timeout_secs),
            ),
        })
    }
}

#[async_trait]
impl DependencyBackend for SystemBackend {
    fn name(&self) -> &str {
        "system"
    }

    async fn is_present(&self, dependency: &Dependency) -> Result<bool, ProvisionError> {
        match dependency {
            Dependency::Model(model) => {
                let problem =
                    check_model_file(&model.path, model.min_size_bytes, model.sha256.as_deref())
                        .await?;
                if let Some(reason) = &problem {
                    tracing::debug!(dependency = %model.name, %reason, "Model not present");
                }
                Ok(problem.is_none())
            }
            Dependency::Packages(set) => self.pip.all_installed(set).await,
        }
    }

    async fn install(
        &self,
        dependency: &Dependency,
        events: Option<&ProvisionEventCallback>,
    ) -> Result<(), ProvisionError> {
        match dependency {
            Dependency::Model(model) => download_model(&self.client, model, events).await,
            Dependency::Packages(set) => self.pip.install_set(set).await,
        }
    }
}
