//! Configuration for the dependency provisioner.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::workspace::Workspace;

use super::types::{Dependency, ModelArtifact, PackageSet};

/// Provisioner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Run `ensure_all` before the server starts accepting requests.
    #[serde(default = "default_true")]
    pub provision_on_startup: bool,

    /// Package tool command: program followed by fixed leading arguments.
    #[serde(default = "default_pip_command")]
    pub pip_command: Vec<String>,

    /// The model artifact.
    #[serde(default)]
    pub model: ModelConfig,

    /// Package sets, ensured in order after the model.
    #[serde(default = "default_package_sets")]
    pub packages: Vec<PackageSetConfig>,

    /// Timeout for a single install/uninstall command in seconds.
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Timeout for a single package query in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

/// Model artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Dependency name used in state, events and metrics.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Download URL.
    #[serde(default = "default_model_url")]
    pub url: String,

    /// File name under `<root>/models/`.
    #[serde(default = "default_model_file_name")]
    pub file_name: String,

    /// Smallest size accepted as a complete file.
    #[serde(default = "default_min_model_size")]
    pub min_size_bytes: u64,

    /// Expected SHA-256 digest (lowercase hex). Checked when set.
    #[serde(default)]
    pub sha256: Option<String>,

    /// Timeout for the whole model download in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

/// A set of packages that are queried and installed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSetConfig {
    /// Dependency name used in state, events and metrics.
    pub name: String,

    /// Packages that must all be reported installed.
    pub packages: Vec<String>,

    /// Packages removed before installing (conflicting builds).
    #[serde(default)]
    pub uninstall_first: Vec<String>,

    /// Extra arguments appended to the install command.
    #[serde(default)]
    pub install_args: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_pip_command() -> Vec<String> {
    vec!["pip".to_string()]
}

fn default_model_name() -> String {
    "inswapper_128".to_string()
}

fn default_model_url() -> String {
    "https://huggingface.co/ezioruan/inswapper_128.onnx/resolve/main/inswapper_128.onnx"
        .to_string()
}

fn default_model_file_name() -> String {
    "inswapper_128.onnx".to_string()
}

fn default_min_model_size() -> u64 {
    100 * 1024 * 1024 // the published model is ~530 MiB
}

fn default_download_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_install_timeout() -> u64 {
    1800
}

fn default_query_timeout() -> u64 {
    30
}

/// Torch is installed before onnxruntime-gpu because the torch install
/// removes any onnxruntime build first.
fn default_package_sets() -> Vec<PackageSetConfig> {
    vec![
        PackageSetConfig {
            name: "torch".to_string(),
            packages: vec![
                "torch".to_string(),
                "torchvision".to_string(),
                "torchaudio".to_string(),
            ],
            uninstall_first: vec!["onnxruntime".to_string(), "onnxruntime-gpu".to_string()],
            install_args: vec![
                "--force-reinstall".to_string(),
                "--index-url".to_string(),
                "https://download.pytorch.org/whl/cu118".to_string(),
            ],
        },
        PackageSetConfig {
            name: "onnxruntime-gpu".to_string(),
            packages: vec!["onnxruntime-gpu".to_string()],
            uninstall_first: vec![],
            install_args: vec![],
        },
    ]
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            url: default_model_url(),
            file_name: default_model_file_name(),
            min_size_bytes: default_min_model_size(),
            sha256: None,
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            provision_on_startup: true,
            pip_command: default_pip_command(),
            model: ModelConfig::default(),
            packages: default_package_sets(),
            install_timeout_secs: default_install_timeout(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

impl ProvisionerConfig {
    /// Builds the ordered dependency list: the model first, then each package set.
    pub fn dependencies(&self, workspace: &Workspace) -> Vec<Dependency> {
        let model = Dependency::Model(ModelArtifact {
            name: self.model.name.clone(),
            url: self.model.url.clone(),
            path: workspace.model_path(&self.model.file_name),
            min_size_bytes: self.model.min_size_bytes,
            sha256: self.model.sha256.as_ref().map(|s| s.to_lowercase()),
            download_timeout: Duration::from_secs(self.model.download_timeout_secs),
        });

        std::iter::once(model)
            .chain(self.packages.iter().map(|set| {
                Dependency::Packages(PackageSet {
                    name: set.name.clone(),
                    packages: set.packages.clone(),
                    uninstall_first: set.uninstall_first.clone(),
                    install_args: set.install_args.clone(),
                })
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceConfig;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = ProvisionerConfig::default();
        assert!(config.provision_on_startup);
        assert_eq!(config.pip_command, vec!["pip".to_string()]);
        assert_eq!(config.model.file_name, "inswapper_128.onnx");
        assert!(config.model.url.starts_with("https://huggingface.co/"));
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.install_timeout_secs, 1800);
    }

    #[test]
    fn test_dependencies_order_and_paths() {
        let config = ProvisionerConfig::default();
        let workspace = Workspace::new(WorkspaceConfig::with_root("/work"));
        let deps = config.dependencies(&workspace);

        let names: Vec<_> = deps.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["inswapper_128", "torch", "onnxruntime-gpu"]);

        match &deps[0] {
            Dependency::Model(model) => {
                assert_eq!(model.path, PathBuf::from("/work/models/inswapper_128.onnx"));
            }
            other => panic!("expected model first, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_is_normalized() {
        let mut config = ProvisionerConfig::default();
        config.model.sha256 = Some("AB".repeat(32));
        let workspace = Workspace::new(WorkspaceConfig::default());
        match &config.dependencies(&workspace)[0] {
            Dependency::Model(model) => assert_eq!(model.sha256, Some("ab".repeat(32))),
            other => panic!("expected model, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_package_sets() {
        let toml = r#"
[[packages]]
name = "onnx"
packages = ["onnxruntime-gpu"]
install_args = ["--no-cache-dir"]
"#;
        let config: ProvisionerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.packages.len(), 1);
        assert_eq!(config.packages[0].install_args, vec!["--no-cache-dir"]);
        assert!(config.packages[0].uninstall_first.is_empty());
    }
}
