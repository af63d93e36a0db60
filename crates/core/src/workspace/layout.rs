//! Path derivation and directory preparation.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::config::{OutputLayout, WorkspaceConfig};

pub const MODELS_DIR: &str = "models";
pub const JOBS_DIR: &str = "jobs";
pub const OUTPUTS_DIR: &str = "outputs";

pub const SOURCE_FILE_NAME: &str = "source_image.jpg";
pub const TARGET_FILE_NAME: &str = "target_video.mp4";
pub const OUTPUT_FILE_NAME: &str = "output_face_swap.mp4";

/// The service's working directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn models_dir(&self) -> PathBuf {
        self.config.root.join(MODELS_DIR)
    }

    /// Path of a model artifact; `file_name` is validated as a bare name by config validation.
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.models_dir().join(file_name)
    }

    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.config.root.join(JOBS_DIR).join(job_id.to_string())
    }

    pub fn source_path(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join(SOURCE_FILE_NAME)
    }

    pub fn target_path(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join(TARGET_FILE_NAME)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.config.root.join(OUTPUTS_DIR)
    }

    pub fn output_path(&self, job_id: Uuid) -> PathBuf {
        match self.config.output_layout {
            OutputLayout::Shared => self.outputs_dir().join(OUTPUT_FILE_NAME),
            OutputLayout::PerJob => self
                .outputs_dir()
                .join(job_id.to_string())
                .join(OUTPUT_FILE_NAME),
        }
    }

    /// Creates the root with its models and outputs directories.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.models_dir()).await?;
        tokio::fs::create_dir_all(self.outputs_dir()).await?;
        tokio::fs::create_dir_all(self.config.root.join(JOBS_DIR)).await
    }

    /// Creates the job's input directory and the directory its output goes to.
    pub async fn prepare_job(&self, job_id: Uuid) -> io::Result<()> {
        let job_dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        let output = self.output_path(job_id);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(job_id = %job_id, dir = %job_dir.display(), "Prepared job directories");
        Ok(())
    }

    /// Removes the job's input directory unless configured to keep inputs.
    ///
    /// Failures are logged, not returned: a leftover input directory never
    /// changes the job's outcome.
    pub async fn cleanup_job(&self, job_id: Uuid) {
        if self.config.keep_inputs {
            return;
        }

        let job_dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&job_dir).await {
            Ok(()) => debug!(job_id = %job_id, "Removed job inputs"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to remove job inputs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_stay_under_root() {
        let workspace = Workspace::new(WorkspaceConfig::with_root("/work"));
        let job_id = Uuid::new_v4();

        assert_eq!(
            workspace.model_path("inswapper_128.onnx"),
            PathBuf::from("/work/models/inswapper_128.onnx")
        );
        assert_eq!(
            workspace.source_path(job_id),
            PathBuf::from(format!("/work/jobs/{}/source_image.jpg", job_id))
        );
        assert_eq!(
            workspace.target_path(job_id),
            PathBuf::from(format!("/work/jobs/{}/target_video.mp4", job_id))
        );
    }

    #[test]
    fn test_shared_output_path() {
        let workspace = Workspace::new(WorkspaceConfig::with_root("/work"));
        assert_eq!(
            workspace.output_path(Uuid::new_v4()),
            PathBuf::from("/work/outputs/output_face_swap.mp4")
        );
    }

    #[test]
    fn test_per_job_output_path() {
        let workspace = Workspace::new(
            WorkspaceConfig::with_root("/work").with_output_layout(OutputLayout::PerJob),
        );
        let job_id = Uuid::new_v4();
        assert_eq!(
            workspace.output_path(job_id),
            PathBuf::from(format!("/work/outputs/{}/output_face_swap.mp4", job_id))
        );
    }

    #[tokio::test]
    async fn test_prepare_and_cleanup_job() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(WorkspaceConfig::with_root(temp.path()));
        let job_id = Uuid::new_v4();

        workspace.prepare_job(job_id).await.unwrap();
        assert!(workspace.job_dir(job_id).is_dir());
        assert!(workspace.outputs_dir().is_dir());

        tokio::fs::write(workspace.source_path(job_id), b"img")
            .await
            .unwrap();
        workspace.cleanup_job(job_id).await;
        assert!(!workspace.job_dir(job_id).exists());
        // Outputs survive cleanup
        assert!(workspace.outputs_dir().is_dir());
    }

    #[tokio::test]
    async fn test_cleanup_respects_keep_inputs() {
        let temp = TempDir::new().unwrap();
        let mut config = WorkspaceConfig::with_root(temp.path());
        config.keep_inputs = true;
        let workspace = Workspace::new(config);
        let job_id = Uuid::new_v4();

        workspace.prepare_job(job_id).await.unwrap();
        workspace.cleanup_job(job_id).await;
        assert!(workspace.job_dir(job_id).is_dir());
    }

    #[tokio::test]
    async fn test_cleanup_missing_job_is_noop() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(WorkspaceConfig::with_root(temp.path()));
        workspace.cleanup_job(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("work");
        let workspace = Workspace::new(WorkspaceConfig::with_root(&root));

        tokio_test::assert_ok!(workspace.ensure_dirs().await);
        assert!(workspace.models_dir().is_dir());
        assert!(workspace.outputs_dir().is_dir());
        assert!(root.join(JOBS_DIR).is_dir());

        // Idempotent
        tokio_test::assert_ok!(workspace.ensure_dirs().await);
    }
}
