//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the fetcher, pipeline and
//! dependency backend traits, so the full swap flow can be exercised
//! without network access, pip or a GPU.
//!
//! # Example
//!
//! ```rust,ignore
//! use faceswap_core::testing::fixtures;
//!
//! let dir = tempfile::tempdir()?;
//! let stack = fixtures::mock_stack(dir.path());
//!
//! let outcome = stack.orchestrator.submit(fixtures::swap_request()).await?;
//! assert_eq!(stack.pipeline.run_count(), 1);
//! ```

mod mock_backend;
mod mock_fetcher;
mod mock_pipeline;

pub use mock_backend::MockDependencyBackend;
pub use mock_fetcher::{MockFetchFailure, MockFetcher};
pub use mock_pipeline::{MockPipeline, MockPipelineFailure};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{MockDependencyBackend, MockFetcher, MockPipeline};
    use crate::orchestrator::{OrchestratorConfig, SwapOrchestrator, SwapRequest};
    use crate::provisioner::{Dependency, ModelArtifact, PackageSet, ProvisionState, Provisioner};
    use crate::workspace::{Workspace, WorkspaceConfig};

    /// Drive file id accepted by the Google Drive provider.
    pub const SOURCE_DRIVE_ID: &str = "1SourceImageFileId_abc";
    pub const TARGET_DRIVE_ID: &str = "1TargetVideoFileId_xyz";

    /// A Drive share link in the `file/d/<id>/view` shape.
    pub fn drive_url(id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view?usp=sharing", id)
    }

    /// A request with valid Drive links for both inputs.
    pub fn swap_request() -> SwapRequest {
        SwapRequest::new(drive_url(SOURCE_DRIVE_ID), drive_url(TARGET_DRIVE_ID))
    }

    /// A model dependency under `root/models`.
    pub fn model_dependency(root: &Path) -> Dependency {
        Dependency::Model(ModelArtifact {
            name: "inswapper_128".to_string(),
            url: "https://example.com/inswapper_128.onnx".to_string(),
            path: root.join("models").join("inswapper_128.onnx"),
            min_size_bytes: 1,
            sha256: None,
            download_timeout: Duration::from_secs(30),
        })
    }

    /// A single-package dependency.
    pub fn package_dependency(name: &str) -> Dependency {
        Dependency::Packages(PackageSet {
            name: name.to_string(),
            packages: vec![name.to_string()],
            uninstall_first: vec![],
            install_args: vec![],
        })
    }

    /// The default dependency list, rooted at `root`.
    pub fn dependencies(root: &Path) -> Vec<Dependency> {
        vec![
            model_dependency(root),
            package_dependency("torch"),
            package_dependency("onnxruntime-gpu"),
        ]
    }

    /// An orchestrator wired to mocks, with handles to each mock.
    pub struct MockStack {
        pub workspace: Arc<Workspace>,
        pub backend: Arc<MockDependencyBackend>,
        pub provisioner: Arc<Provisioner>,
        pub fetcher: Arc<MockFetcher>,
        pub pipeline: Arc<MockPipeline>,
        pub orchestrator: SwapOrchestrator,
    }

    /// Builds a [`MockStack`] with a workspace at `root`.
    pub fn mock_stack(root: &Path) -> MockStack {
        mock_stack_with(WorkspaceConfig::with_root(root), OrchestratorConfig::default())
    }

    /// Builds a [`MockStack`] from explicit workspace and orchestrator settings.
    pub fn mock_stack_with(workspace: WorkspaceConfig, config: OrchestratorConfig) -> MockStack {
        let root: PathBuf = workspace.root.clone();
        let workspace = Arc::new(Workspace::new(workspace));
        let backend = Arc::new(MockDependencyBackend::new());
        let provisioner = Arc::new(Provisioner::new(
            backend.clone(),
            dependencies(&root),
            Arc::new(ProvisionState::new()),
        ));
        let fetcher = Arc::new(MockFetcher::new());
        let pipeline = Arc::new(MockPipeline::new());

        let orchestrator = SwapOrchestrator::new(
            config,
            Arc::clone(&workspace),
            Arc::clone(&provisioner),
            fetcher.clone(),
            pipeline.clone(),
        );

        MockStack {
            workspace,
            backend,
            provisioner,
            fetcher,
            pipeline,
            orchestrator,
        }
    }
}
