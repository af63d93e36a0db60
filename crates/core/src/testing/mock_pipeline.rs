//! Mock pipeline runner for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::runner::{PipelineJob, PipelineRunner, PoolStatus, ProcessResult, RunnerError};

/// How a mocked run should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockPipelineFailure {
    /// Non-zero exit with this stderr.
    Exit { code: i32, stderr: String },
    /// Ran past its timeout.
    Timeout,
    /// Interpreter missing.
    Spawn,
    /// Exit 0 without writing the output.
    NoOutput,
}

/// Mock implementation of the PipelineRunner trait.
///
/// A successful run writes a small file at the job's output path.
#[derive(Debug)]
pub struct MockPipeline {
    jobs: Mutex<Vec<PipelineJob>>,
    failure: Mutex<Option<MockPipelineFailure>>,
    delay: Mutex<Option<Duration>>,
    active: AtomicU64,
    peak_active: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Default for MockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPipeline {
    /// Create a new mock pipeline that always succeeds.
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            active: AtomicU64::new(0),
            peak_active: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Makes every following run fail.
    pub fn set_failure(&self, failure: MockPipelineFailure) {
        *lock(&self.failure) = Some(failure);
    }

    /// Simulated run time.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Jobs started so far.
    pub fn jobs(&self) -> Vec<PipelineJob> {
        lock(&self.jobs).clone()
    }

    pub fn run_count(&self) -> usize {
        lock(&self.jobs).len()
    }

    /// Most runs that were in progress at the same time.
    pub fn peak_active(&self) -> u64 {
        self.peak_active.load(Ordering::Relaxed)
    }

    async fn execute(&self, job: &PipelineJob) -> Result<ProcessResult, RunnerError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.failure).clone();
        match failure {
            Some(MockPipelineFailure::Exit { code, stderr }) => Err(RunnerError::Failed {
                exit_code: Some(code),
                stderr_tail: stderr,
            }),
            Some(MockPipelineFailure::Timeout) => Err(RunnerError::Timeout {
                timeout: Duration::from_secs(1),
                stderr_tail: String::new(),
            }),
            Some(MockPipelineFailure::Spawn) => Err(RunnerError::Spawn {
                program: PathBuf::from("python"),
                reason: "No such file or directory (os error 2)".to_string(),
            }),
            Some(MockPipelineFailure::NoOutput) => Err(RunnerError::MissingOutput {
                path: job.output.clone(),
            }),
            None => {
                if let Some(parent) = job.output.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&job.output, b"mock swapped video").await?;
                Ok(ProcessResult {
                    exit_code: Some(0),
                    stdout_tail: "Processing to video succeed!".to_string(),
                    stderr_tail: String::new(),
                    duration: delay.unwrap_or_default(),
                })
            }
        }
    }
}

#[async_trait]
impl PipelineRunner for MockPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, job: &PipelineJob) -> Result<ProcessResult, RunnerError> {
        lock(&self.jobs).push(job.clone());
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_active.fetch_max(active, Ordering::Relaxed);
        let result = self.execute(job).await;
        self.active.fetch_sub(1, Ordering::Relaxed);

        match &result {
            Ok(_) => self.processed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            name: "mock".to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent: 1,
            queued_jobs: 0,
            total_processed: self.processed.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
