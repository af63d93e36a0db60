//! Package presence queries and installs through pip.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::runner::tail_lines;

use super::error::ProvisionError;
use super::types::PackageSet;

/// Lines of stderr kept from a failed install.
const STDERR_TAIL_LINES: usize = 20;

/// Thin wrapper over the pip command line.
#[derive(Debug, Clone)]
pub struct PipTool {
    program: PathBuf,
    base_args: Vec<String>,
    query_timeout: Duration,
    install_timeout: Duration,
}

impl PipTool {
    /// `command` is the program followed by fixed leading arguments,
    /// e.g. `["python", "-m", "pip"]`. An empty command means `pip`.
    pub fn new(command: &[String], query_timeout: Duration, install_timeout: Duration) -> Self {
        let (program, base_args) = match command.split_first() {
            Some((program, rest)) => (PathBuf::from(program), rest.to_vec()),
            None => (PathBuf::from("pip"), Vec::new()),
        };
        Self {
            program,
            base_args,
            query_timeout,
            install_timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ProvisionError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ToolNotFound {
                path: self.program.clone(),
            }
        } else {
            ProvisionError::Io(e)
        }
    }

    /// `pip show <package>` exits 0 iff the package is installed.
    pub async fn is_installed(
        &self,
        dependency: &str,
        package: &str,
    ) -> Result<bool, ProvisionError> {
        let mut cmd = self.command();
        cmd.args(["show", package])
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = tokio::time::timeout(self.query_timeout, cmd.status())
            .await
            .map_err(|_| {
                ProvisionError::timeout(
                    dependency,
                    format!("query {}", package),
                    self.query_timeout.as_secs(),
                )
            })?
            .map_err(|e| self.spawn_error(e))?;

        debug!(dependency, package, installed = status.success(), "Queried package");
        Ok(status.success())
    }

    /// True when every package of the set is installed.
    pub async fn all_installed(&self, set: &PackageSet) -> Result<bool, ProvisionError> {
        for package in &set.packages {
            if !self.is_installed(&set.name, package).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Removes conflicting packages, then installs the set.
    pub async fn install_set(&self, set: &PackageSet) -> Result<(), ProvisionError> {
        if !set.uninstall_first.is_empty() {
            let mut args = vec!["uninstall".to_string(), "-y".to_string()];
            args.extend(set.uninstall_first.iter().cloned());
            self.run(&set.name, "uninstall", &args).await?;
        }

        let mut args = vec!["install".to_string()];
        args.extend(set.packages.iter().cloned());
        args.extend(set.install_args.iter().cloned());
        self.run(&set.name, "install", &args).await
    }

    async fn run(
        &self,
        dependency: &str,
        action: &str,
        args: &[String],
    ) -> Result<(), ProvisionError> {
        info!(dependency, action, args = ?args, "Running package tool");

        let mut cmd = self.command();
        cmd.args(args).stdout(Stdio::null()).stderr(Stdio::piped());

        let output = tokio::time::timeout(self.install_timeout, cmd.output())
            .await
            .map_err(|_| {
                ProvisionError::timeout(dependency, action, self.install_timeout.as_secs())
            })?
            .map_err(|e| self.spawn_error(e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = tail_lines(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES);
        Err(ProvisionError::install_failed(
            dependency,
            format!("pip {} exited with code {:?}", action, output.status.code()),
            if stderr.is_empty() { None } else { Some(stderr) },
        ))
    }
}
