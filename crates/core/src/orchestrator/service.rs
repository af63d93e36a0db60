//! Swap orchestrator implementation.
//!
//! Drives one request through validation, provisioning, fetching and the
//! pipeline, returning either the output path or a typed failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::fetcher::{AssetFetcher, AssetReference};
use crate::metrics::{SWAP_DURATION, SWAP_JOBS, SWAP_JOBS_IN_FLIGHT};
use crate::provisioner::Provisioner;
use crate::runner::{PipelineJob, PipelineRunner, PoolStatus};
use crate::workspace::{OutputLayout, Workspace};

use super::config::OrchestratorConfig;
use super::types::{
    JobStatus, OrchestratorStatus, SwapError, SwapErrorKind, SwapEvent, SwapEventCallback,
    SwapJob, SwapOutcome, SwapRequest,
};

/// Per-stage job counts.
#[derive(Debug, Default)]
struct StageCounters {
    pending: AtomicU64,
    provisioning: AtomicU64,
    fetching: AtomicU64,
    running: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl StageCounters {
    fn counter(&self, status: JobStatus) -> &AtomicU64 {
        match status {
            JobStatus::Pending => &self.pending,
            JobStatus::Provisioning => &self.provisioning,
            JobStatus::Fetching => &self.fetching,
            JobStatus::Running => &self.running,
            JobStatus::Succeeded => &self.succeeded,
            JobStatus::Failed => &self.failed,
        }
    }

    fn load(&self, status: JobStatus) -> u64 {
        self.counter(status).load(Ordering::Relaxed)
    }
}

/// A job plus its bookkeeping. Dropping it mid-flight (timeout or
/// cancellation) releases its stage count.
struct JobRun<'a> {
    job: SwapJob,
    counters: &'a StageCounters,
    events: Option<&'a SwapEventCallback>,
}

impl<'a> JobRun<'a> {
    fn new(job: SwapJob, counters: &'a StageCounters, events: Option<&'a SwapEventCallback>) -> Self {
        counters.counter(job.status).fetch_add(1, Ordering::Relaxed);
        Self {
            job,
            counters,
            events,
        }
    }

    fn id(&self) -> Uuid {
        self.job.id
    }

    fn status(&self) -> JobStatus {
        self.job.status
    }

    fn emit(&self, event: SwapEvent) {
        if let Some(cb) = self.events {
            cb(&event);
        }
    }

    fn advance(&mut self, status: JobStatus) {
        let previous = self.job.status;
        if previous == status {
            return;
        }
        if !previous.is_terminal() {
            self.counters.counter(previous).fetch_sub(1, Ordering::Relaxed);
        }
        self.counters.counter(status).fetch_add(1, Ordering::Relaxed);
        self.job.status = status;

        debug!(job_id = %self.job.id, from = %previous, to = %status, "Job stage changed");
        self.emit(SwapEvent::StageChanged {
            job_id: self.job.id,
            status,
        });
    }
}

impl Drop for JobRun<'_> {
    fn drop(&mut self) {
        if !self.job.status.is_terminal() {
            self.counters
                .counter(self.job.status)
                .fetch_sub(1, Ordering::Relaxed);
        }
    }
}

struct InFlight;

impl InFlight {
    fn enter() -> Self {
        SWAP_JOBS_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        SWAP_JOBS_IN_FLIGHT.dec();
    }
}

/// Runs swap jobs end to end.
pub struct SwapOrchestrator {
    config: OrchestratorConfig,
    workspace: Arc<Workspace>,
    provisioner: Arc<Provisioner>,
    fetcher: Arc<dyn AssetFetcher>,
    pipeline: Arc<dyn PipelineRunner>,
    events: Option<SwapEventCallback>,
    counters: StageCounters,
    /// Held from pipeline start until the result is returned when every
    /// job writes the same output file.
    shared_output: Arc<Mutex<()>>,
}

impl SwapOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        workspace: Arc<Workspace>,
        provisioner: Arc<Provisioner>,
        fetcher: Arc<dyn AssetFetcher>,
        pipeline: Arc<dyn PipelineRunner>,
    ) -> Self {
        Self {
            config,
            workspace,
            provisioner,
            fetcher,
            pipeline,
            events: None,
            counters: StageCounters::default(),
            shared_output: Arc::new(Mutex::new(())),
        }
    }

    /// Sets a callback for job events.
    pub fn with_event_callback(mut self, callback: SwapEventCallback) -> Self {
        self.events = Some(callback);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn provisioner(&self) -> &Arc<Provisioner> {
        &self.provisioner
    }

    pub fn pipeline_status(&self) -> PoolStatus {
        self.pipeline.pool_status()
    }

    /// Current job counts.
    pub fn status(&self) -> OrchestratorStatus {
        let pending = self.counters.load(JobStatus::Pending) as usize;
        let provisioning = self.counters.load(JobStatus::Provisioning) as usize;
        let fetching = self.counters.load(JobStatus::Fetching) as usize;
        let running = self.counters.load(JobStatus::Running) as usize;

        OrchestratorStatus {
            running_jobs: pending + provisioning + fetching + running,
            pending_count: pending,
            provisioning_count: provisioning,
            fetching_count: fetching,
            running_count: running,
            total_succeeded: self.counters.load(JobStatus::Succeeded),
            total_failed: self.counters.load(JobStatus::Failed),
        }
    }

    /// Builds the job for a request: a fresh id and orchestrator-chosen paths.
    pub fn create_job(&self, request: &SwapRequest) -> SwapJob {
        let id = Uuid::new_v4();
        SwapJob {
            id,
            source: AssetReference::new(request.source_url.trim(), self.workspace.source_path(id)),
            target: AssetReference::new(request.target_url.trim(), self.workspace.target_path(id)),
            output_path: self.workspace.output_path(id),
            status: JobStatus::Pending,
            failure: None,
            created_at: Utc::now(),
        }
    }

    /// Runs one request to completion.
    ///
    /// The whole job is bounded by `request_timeout_secs`; on expiry its
    /// fetches and child process are dropped (and so cancelled) and the
    /// error kind is [`SwapErrorKind::Timeout`].
    pub async fn submit(&self, request: SwapRequest) -> Result<SwapOutcome, SwapError> {
        let _in_flight = InFlight::enter();
        let started = Instant::now();
        let mut run = JobRun::new(self.create_job(&request), &self.counters, self.events.as_ref());
        let job_id = run.id();

        info!(job_id = %job_id, "Swap job accepted");
        run.emit(SwapEvent::Accepted { job_id });

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let result = tokio::time::timeout(timeout, self.execute(&mut run)).await;
        let (result, _output_lock) = match result {
            Ok(Ok(lock)) => (Ok(()), lock),
            Ok(Err(err)) => (Err(err), None),
            Err(_) => {
                let err = SwapError::new(
                    job_id,
                    SwapErrorKind::Timeout,
                    run.status(),
                    format!("job exceeded {}s", self.config.request_timeout_secs),
                );
                (Err(err), None)
            }
        };

        self.workspace.cleanup_job(job_id).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match result {
            Ok(()) => {
                run.advance(JobStatus::Succeeded);
                SWAP_JOBS.with_label_values(&["success"]).inc();
                SWAP_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed.as_secs_f64());

                let output_path = run.job.output_path.clone();
                info!(job_id = %job_id, elapsed_ms, output = %output_path.display(), "Swap job completed");
                run.emit(SwapEvent::Completed {
                    job_id,
                    output_path: output_path.clone(),
                    elapsed_ms,
                });

                Ok(SwapOutcome {
                    job_id,
                    output_path,
                    elapsed_ms,
                })
            }
            Err(err) => {
                run.job.failure = Some(err.clone());
                run.advance(JobStatus::Failed);
                SWAP_JOBS.with_label_values(&[err.kind.as_str()]).inc();
                SWAP_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed.as_secs_f64());

                warn!(
                    job_id = %job_id,
                    kind = %err.kind,
                    stage = %err.stage,
                    elapsed_ms,
                    error = %err.message,
                    "Swap job failed"
                );
                run.emit(SwapEvent::Failed {
                    job_id,
                    kind: err.kind,
                    stage: err.stage,
                    message: err.message.clone(),
                });

                Err(err)
            }
        }
    }

    /// Returns the shared output lock, if one was taken, so the caller can
    /// hold it until the outcome is returned.
    async fn execute(
        &self,
        run: &mut JobRun<'_>,
    ) -> Result<Option<OwnedMutexGuard<()>>, SwapError> {
        let job_id = run.id();

        // Reject malformed links before anything slow happens.
        for reference in [&run.job.source, &run.job.target] {
            self.fetcher
                .validate(reference)
                .map_err(|e| SwapError::from_fetch(job_id, JobStatus::Pending, &e))?;
        }

        if self.config.provision_before_jobs {
            run.advance(JobStatus::Provisioning);
            let ready = self
                .provisioner
                .ensure_all()
                .await
                .map_err(|e| SwapError::from_provision(job_id, &e))?;
            for (dependency, readiness) in ready {
                run.emit(SwapEvent::DependencyReady {
                    job_id,
                    dependency,
                    readiness,
                });
            }
        }

        run.advance(JobStatus::Fetching);
        self.workspace.prepare_job(job_id).await.map_err(|e| {
            SwapError::new(
                job_id,
                SwapErrorKind::SpawnError,
                JobStatus::Fetching,
                format!("failed to prepare job directories: {e}"),
            )
        })?;

        // try_join drops the other fetch as soon as one fails.
        let (source, target) = tokio::try_join!(
            self.fetcher.fetch(&run.job.source),
            self.fetcher.fetch(&run.job.target),
        )
        .map_err(|e| SwapError::from_fetch(job_id, JobStatus::Fetching, &e))?;

        let output_lock = match self.workspace.config().output_layout {
            OutputLayout::Shared => Some(Arc::clone(&self.shared_output).lock_owned().await),
            OutputLayout::PerJob => None,
        };

        run.advance(JobStatus::Running);
        let pipeline_job = PipelineJob {
            job_id,
            source,
            target,
            output: run.job.output_path.clone(),
        };
        self.pipeline
            .run(&pipeline_job)
            .await
            .map_err(|e| SwapError::from_runner(job_id, &e))?;

        Ok(output_lock)
    }
}
