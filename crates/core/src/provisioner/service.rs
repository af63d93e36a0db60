//! The dependency provisioner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::metrics::PROVISION_ACTIONS;

use super::backend::DependencyBackend;
use super::error::ProvisionError;
use super::state::ProvisionState;
use super::types::{
    Dependency, DependencySnapshot, DependencyStatus, ProvisionEvent, ProvisionEventCallback,
    ProvisionSnapshot, Readiness,
};

/// Ensures heavyweight dependencies exist exactly once per process.
pub struct Provisioner {
    backend: Arc<dyn DependencyBackend>,
    dependencies: Vec<Dependency>,
    state: Arc<ProvisionState>,
    events: Option<ProvisionEventCallback>,
}

impl Provisioner {
    /// Creates a provisioner over the given dependencies.
    ///
    /// `state` may be shared with other provisioners; entries are keyed by
    /// dependency name.
    pub fn new(
        backend: Arc<dyn DependencyBackend>,
        dependencies: Vec<Dependency>,
        state: Arc<ProvisionState>,
    ) -> Self {
        Self {
            backend,
            dependencies,
            state,
            events: None,
        }
    }

    /// Sets a callback for provisioning events.
    pub fn with_event_callback(mut self, callback: ProvisionEventCallback) -> Self {
        self.events = Some(callback);
        self
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn state(&self) -> &Arc<ProvisionState> {
        &self.state
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Ensures one dependency.
    ///
    /// Runs on a spawned task that owns the dependency's lock, so a caller
    /// that gives up (request timeout) does not abort an install other
    /// callers are waiting on.
    pub async fn ensure(&self, dependency: &Dependency) -> Result<Readiness, ProvisionError> {
        let slot = self.state.slot(dependency.name());
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let dep = dependency.clone();

        let task = tokio::spawn(async move {
            let mut status = slot.lock_owned().await;
            let result = ensure_locked(&mut status, backend.as_ref(), &dep, events.as_ref()).await;

            let label = match &result {
                Ok(Readiness::Cached) => "cached",
                Ok(Readiness::AlreadyPresent) => "present",
                Ok(Readiness::Installed) => "installed",
                Err(_) => "failed",
            };
            PROVISION_ACTIONS.with_label_values(&[dep.name(), label]).inc();
            result
        });

        task.await.map_err(|_| ProvisionError::TaskAborted {
            dependency: dependency.name().to_string(),
        })?
    }

    /// Ensures a configured dependency by name.
    pub async fn ensure_named(&self, name: &str) -> Result<Readiness, ProvisionError> {
        let dependency = self
            .dependencies
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| ProvisionError::UnknownDependency(name.to_string()))?;
        self.ensure(dependency).await
    }

    /// Ensures every configured dependency in order, stopping at the first failure.
    pub async fn ensure_all(&self) -> Result<Vec<(String, Readiness)>, ProvisionError> {
        let mut outcomes = Vec::with_capacity(self.dependencies.len());
        for dependency in &self.dependencies {
            let readiness = self.ensure(dependency).await?;
            outcomes.push((dependency.name().to_string(), readiness));
        }
        Ok(outcomes)
    }

    /// Forgets cached results and runs every check again.
    pub async fn recheck_all(&self) -> Result<Vec<(String, Readiness)>, ProvisionError> {
        for dependency in &self.dependencies {
            self.state.invalidate(dependency.name()).await;
        }
        self.ensure_all().await
    }

    /// Current status of every configured dependency.
    pub fn snapshot(&self) -> ProvisionSnapshot {
        let dependencies: Vec<DependencySnapshot> = self
            .dependencies
            .iter()
            .map(|d| {
                let (status, in_progress) = self.state.peek(d.name());
                DependencySnapshot {
                    name: d.name().to_string(),
                    kind: d.kind().to_string(),
                    in_progress,
                    status,
                }
            })
            .collect();

        ProvisionSnapshot {
            all_ready: dependencies.iter().all(|d| d.status.is_ready()),
            dependencies,
        }
    }
}

fn emit(events: Option<&ProvisionEventCallback>, event: ProvisionEvent) {
    if let Some(cb) = events {
        cb(&event);
    }
}

fn record_failure(
    status: &mut DependencyStatus,
    events: Option<&ProvisionEventCallback>,
    name: &str,
    err: &ProvisionError,
) {
    error!(dependency = name, error = %err, "Provisioning failed");
    *status = DependencyStatus::Failed {
        reason: err.to_string(),
        checked_at: Utc::now(),
    };
    emit(
        events,
        ProvisionEvent::Failed {
            dependency: name.to_string(),
            reason: err.to_string(),
        },
    );
}

fn record_ready(
    status: &mut DependencyStatus,
    events: Option<&ProvisionEventCallback>,
    name: &str,
    readiness: Readiness,
) -> Readiness {
    *status = DependencyStatus::Ready {
        checked_at: Utc::now(),
    };
    emit(
        events,
        ProvisionEvent::Ready {
            dependency: name.to_string(),
            readiness,
        },
    );
    readiness
}

/// Check-then-install; the caller holds the dependency's lock.
async fn ensure_locked(
    status: &mut DependencyStatus,
    backend: &dyn DependencyBackend,
    dependency: &Dependency,
    events: Option<&ProvisionEventCallback>,
) -> Result<Readiness, ProvisionError> {
    let name = dependency.name();

    match status {
        DependencyStatus::Ready { .. } => return Ok(Readiness::Cached),
        DependencyStatus::Failed { reason, .. } => {
            return Err(ProvisionError::PreviouslyFailed {
                dependency: name.to_string(),
                reason: reason.clone(),
            });
        }
        DependencyStatus::Unknown => {}
    }

    emit(
        events,
        ProvisionEvent::Checking {
            dependency: name.to_string(),
        },
    );

    match backend.is_present(dependency).await {
        Ok(true) => {
            info!(dependency = name, "Dependency already present");
            return Ok(record_ready(status, events, name, Readiness::AlreadyPresent));
        }
        Ok(false) => {}
        Err(e) => {
            record_failure(status, events, name, &e);
            return Err(e);
        }
    }

    info!(dependency = name, kind = dependency.kind(), "Installing dependency");
    emit(
        events,
        ProvisionEvent::Installing {
            dependency: name.to_string(),
        },
    );

    if let Err(e) = backend.install(dependency, events).await {
        record_failure(status, events, name, &e);
        return Err(e);
    }

    let verified = match backend.is_present(dependency).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ProvisionError::verification_failed(
            name,
            "still absent after install",
        )),
        Err(e) => Err(e),
    };

    match verified {
        Ok(()) => {
            info!(dependency = name, "Dependency installed");
            Ok(record_ready(status, events, name, Readiness::Installed))
        }
        Err(e) => {
            record_failure(status, events, name, &e);
            Err(e)
        }
    }
}
