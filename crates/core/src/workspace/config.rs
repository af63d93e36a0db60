//! Configuration for the working directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where pipeline outputs are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `<root>/outputs/output_face_swap.mp4`, overwritten by every job.
    #[default]
    Shared,
    /// `<root>/outputs/<job_id>/output_face_swap.mp4`.
    PerJob,
}

/// Working directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root working directory. The pipeline runs with this as its cwd.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Output file layout.
    #[serde(default)]
    pub output_layout: OutputLayout,

    /// Keep per-job input files after the job finishes.
    #[serde(default)]
    pub keep_inputs: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("roop")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_layout: OutputLayout::default(),
            keep_inputs: false,
        }
    }
}

impl WorkspaceConfig {
    /// Creates a config rooted at the given directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Sets the output layout.
    pub fn with_output_layout(mut self, layout: OutputLayout) -> Self {
        self.output_layout = layout;
        self
    }
}
