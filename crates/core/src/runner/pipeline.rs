//! The face swap pipeline wrapper.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::metrics::{PIPELINE_DURATION, PIPELINE_RUNS};

use super::config::PipelineConfig;
use super::error::RunnerError;
use super::process::{output_exists, ProcessCommand, ProcessRunner};
use super::types::{PipelineJob, PoolStatus, ProcessResult};

/// Runs the external face swap step for one job.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs the pipeline; on success the job's output file exists.
    async fn run(&self, job: &PipelineJob) -> Result<ProcessResult, RunnerError>;

    /// Current pool statistics.
    fn pool_status(&self) -> PoolStatus;
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Increments a gauge for as long as it is alive.
struct Gauge<'a>(&'a AtomicU64);

impl<'a> Gauge<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Gauge<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Invokes `<interpreter> <script> --target .. --source .. -o ..` as a child.
pub struct FaceSwapPipeline {
    config: PipelineConfig,
    working_dir: PathBuf,
    runner: ProcessRunner,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl FaceSwapPipeline {
    /// Creates the pipeline. `default_dir` is used when the config has no
    /// working directory (normally the workspace root).
    pub fn new(config: PipelineConfig, default_dir: impl Into<PathBuf>) -> Self {
        let working_dir = config
            .working_dir
            .clone()
            .unwrap_or_else(|| default_dir.into());
        let runner = ProcessRunner::new(config.inherit_env.clone(), config.tail_lines);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        Self {
            config,
            working_dir,
            runner,
            semaphore,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Builds the argument vector. Paths are made absolute because the child
    /// runs in the working directory, not ours.
    pub fn build_args(&self, job: &PipelineJob) -> Result<Vec<OsString>, RunnerError> {
        let mut args: Vec<OsString> = vec![self.config.script.clone().into()];
        args.push("--target".into());
        args.push(std::path::absolute(&job.target)?.into());
        args.push("--source".into());
        args.push(std::path::absolute(&job.source)?.into());
        args.push("-o".into());
        args.push(std::path::absolute(&job.output)?.into());
        args.push("--execution-provider".into());
        args.push(self.config.execution_provider.clone().into());
        args.push("--frame-processor".into());
        args.push(self.config.frame_processor.clone().into());
        args.extend(self.config.extra_args.iter().map(OsString::from));
        Ok(args)
    }

    async fn run_permitted(&self, job: &PipelineJob) -> Result<ProcessResult, RunnerError> {
        // A stale output (shared layout) must not pass for this run's.
        match tokio::fs::remove_file(&job.output).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RunnerError::Io(e)),
        }

        let command = ProcessCommand {
            program: self.config.interpreter.clone(),
            args: self.build_args(job)?,
            cwd: Some(self.working_dir.clone()),
            env: self.config.env.clone(),
        };

        let result = self
            .runner
            .run(&command, Duration::from_secs(self.config.timeout_secs))
            .await?;

        if !output_exists(&job.output).await {
            return Err(RunnerError::MissingOutput {
                path: job.output.clone(),
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl PipelineRunner for FaceSwapPipeline {
    fn name(&self) -> &str {
        "face_swap"
    }

    async fn run(&self, job: &PipelineJob) -> Result<ProcessResult, RunnerError> {
        let permit = {
            let _queued = Gauge::enter(&self.stats.queued);
            self.semaphore
                .acquire()
                .await
                .map_err(|_| RunnerError::Spawn {
                    program: self.config.interpreter.clone(),
                    reason: "pipeline pool closed".to_string(),
                })?
        };
        let _active = Gauge::enter(&self.stats.active);

        info!(job_id = %job.job_id, provider = %self.config.execution_provider, "Starting pipeline");
        let timer = PIPELINE_DURATION.start_timer();
        let result = self.run_permitted(job).await;
        drop(permit);

        let label = match &result {
            Ok(_) => {
                timer.observe_duration();
                self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
                "success"
            }
            Err(e) => {
                timer.stop_and_discard();
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                warn!(job_id = %job.job_id, error = %e, "Pipeline failed");
                match e {
                    RunnerError::Spawn { .. } => "spawn_error",
                    RunnerError::Timeout { .. } => "timeout",
                    _ => "failed",
                }
            }
        };
        PIPELINE_RUNS.with_label_values(&[label]).inc();

        if let Ok(r) = &result {
            info!(
                job_id = %job.job_id,
                elapsed_ms = r.duration.as_millis() as u64,
                "Pipeline finished"
            );
        }
        result
    }

    fn pool_status(&self) -> PoolStatus {
        self.stats
            .to_status(self.name(), self.config.max_concurrent.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(root: &Path) -> PipelineJob {
        PipelineJob {
            job_id: Uuid::new_v4(),
            source: root.join("source_image.jpg"),
            target: root.join("target_video.mp4"),
            output: root.join("out").join("output_face_swap.mp4"),
        }
    }

    #[test]
    fn test_build_args() {
        let config = PipelineConfig {
            extra_args: vec!["--keep-fps".to_string()],
            ..Default::default()
        };
        let pipeline = FaceSwapPipeline::new(config, "/work");
        let job = job(Path::new("/work/jobs/1"));

        let args: Vec<String> = pipeline
            .build_args(&job)
            .unwrap()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "run.py",
                "--target",
                "/work/jobs/1/target_video.mp4",
                "--source",
                "/work/jobs/1/source_image.jpg",
                "-o",
                "/work/jobs/1/out/output_face_swap.mp4",
                "--execution-provider",
                "cuda",
                "--frame-processor",
                "face_swapper",
                "--keep-fps",
            ]
        );
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let pipeline = FaceSwapPipeline::new(PipelineConfig::default(), "/work");
        let args = pipeline.build_args(&job(Path::new("roop/jobs/1"))).unwrap();
        assert!(Path::new(&args[2]).is_absolute());
    }

    #[test]
    fn test_working_dir_override() {
        let config = PipelineConfig {
            working_dir: Some(PathBuf::from("/opt/roop")),
            ..Default::default()
        };
        let pipeline = FaceSwapPipeline::new(config, "/work");
        assert_eq!(pipeline.working_dir(), Path::new("/opt/roop"));
    }

    #[test]
    fn test_initial_pool_status() {
        let pipeline = FaceSwapPipeline::new(PipelineConfig::default().with_max_concurrent(2), ".");
        let status = pipeline.pool_status();
        assert_eq!(status.name, "face_swap");
        assert_eq!(status.max_concurrent, 2);
        assert_eq!(status.active_jobs, 0);
        assert_eq!(status.total_processed, 0);
    }

    #[test]
    fn test_gauge() {
        let counter = AtomicU64::new(0);
        {
            let _a = Gauge::enter(&counter);
            let _b = Gauge::enter(&counter);
            assert_eq!(counter.load(Ordering::Relaxed), 2);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
