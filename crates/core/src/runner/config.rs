//! Configuration for the face swap pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// External pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Interpreter that runs the script.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Pipeline entry script, relative to the working directory.
    #[serde(default = "default_script")]
    pub script: PathBuf,

    /// Working directory. Defaults to the workspace root.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Value for `--execution-provider`.
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// Value for `--frame-processor`.
    #[serde(default = "default_frame_processor")]
    pub frame_processor: String,

    /// Arguments appended after the standard ones.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Timeout for one run in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent runs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Variables inherited from the service's own environment when set.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: Vec<String>,

    /// Variables set explicitly for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Lines of stdout/stderr kept from each run.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python")
}

fn default_script() -> PathBuf {
    PathBuf::from("run.py")
}

fn default_execution_provider() -> String {
    "cuda".to_string()
}

fn default_frame_processor() -> String {
    "face_swapper".to_string()
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_max_concurrent() -> usize {
    1
}

fn default_inherit_env() -> Vec<String> {
    ["PATH", "HOME", "LD_LIBRARY_PATH", "CUDA_VISIBLE_DEVICES"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_tail_lines() -> usize {
    40
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            working_dir: None,
            execution_provider: default_execution_provider(),
            frame_processor: default_frame_processor(),
            extra_args: Vec::new(),
            timeout_secs: default_timeout(),
            max_concurrent: default_max_concurrent(),
            inherit_env: default_inherit_env(),
            env: BTreeMap::new(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl PipelineConfig {
    /// Sets the interpreter and script.
    pub fn with_command(mut self, interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self.script = script.into();
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum number of concurrent runs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.interpreter, PathBuf::from("python"));
        assert_eq!(config.script, PathBuf::from("run.py"));
        assert_eq!(config.execution_provider, "cuda");
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.max_concurrent, 1);
        assert!(config.inherit_env.contains(&"PATH".to_string()));
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::default()
            .with_command("sh", "fake.sh")
            .with_timeout(5)
            .with_max_concurrent(3);
        assert_eq!(config.interpreter, PathBuf::from("sh"));
        assert_eq!(config.script, PathBuf::from("fake.sh"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_concurrent, 3);
    }
}
