//! Mock dependency backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::provisioner::{
    Dependency, DependencyBackend, ProvisionError, ProvisionEvent, ProvisionEventCallback,
};

/// Mock implementation of the DependencyBackend trait.
///
/// Keeps an in-memory set of "installed" dependencies and counts every
/// check and install so tests can assert idempotence.
#[derive(Debug, Default)]
pub struct MockDependencyBackend {
    present: Mutex<HashSet<String>>,
    install_failures: Mutex<HashMap<String, String>>,
    ineffective: Mutex<HashSet<String>>,
    checks: Mutex<HashMap<String, usize>>,
    installs: Mutex<HashMap<String, usize>>,
    install_delay: Mutex<Option<Duration>>,
}

impl MockDependencyBackend {
    /// Create a backend where nothing is installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a dependency as already present.
    pub fn set_present(&self, name: &str) {
        lock(&self.present).insert(name.to_string());
    }

    /// Makes installs of `name` fail with `reason`.
    pub fn fail_install(&self, name: &str, reason: &str) {
        lock(&self.install_failures).insert(name.to_string(), reason.to_string());
    }

    /// Makes installs of `name` report success without making it present.
    pub fn install_has_no_effect(&self, name: &str) {
        lock(&self.ineffective).insert(name.to_string());
    }

    /// Simulated install time.
    pub fn set_install_delay(&self, delay: Duration) {
        *lock(&self.install_delay) = Some(delay);
    }

    pub fn install_count(&self, name: &str) -> usize {
        lock(&self.installs).get(name).copied().unwrap_or(0)
    }

    pub fn total_installs(&self) -> usize {
        lock(&self.installs).values().sum()
    }

    pub fn check_count(&self, name: &str) -> usize {
        lock(&self.checks).get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DependencyBackend for MockDependencyBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_present(&self, dependency: &Dependency) -> Result<bool, ProvisionError> {
        let name = dependency.name();
        *lock(&self.checks).entry(name.to_string()).or_insert(0) += 1;
        Ok(lock(&self.present).contains(name))
    }

    async fn install(
        &self,
        dependency: &Dependency,
        events: Option<&ProvisionEventCallback>,
    ) -> Result<(), ProvisionError> {
        let name = dependency.name();
        *lock(&self.installs).entry(name.to_string()).or_insert(0) += 1;

        let delay = *lock(&self.install_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(cb) = events {
            cb(&ProvisionEvent::DownloadProgress {
                dependency: name.to_string(),
                downloaded_bytes: 1,
                total_bytes: Some(1),
            });
        }

        let failure = lock(&self.install_failures).get(name).cloned();
        if let Some(reason) = failure {
            return Err(ProvisionError::install_failed(name, reason, None));
        }

        if !lock(&self.ineffective).contains(name) {
            lock(&self.present).insert(name.to_string());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
