use super::{types::Config, ConfigError};
use crate::workspace::OutputLayout;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Pipeline concurrency cap is at least 1, and exactly 1 with a shared output file
/// - Every timeout is non-zero
/// - Model URL is set and any configured checksum is a SHA-256 hex digest
/// - Package sets name at least one package and a pip command is set
/// - Fetcher size limit is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.pipeline.max_concurrent == 0 {
        return Err(invalid("pipeline.max_concurrent must be at least 1"));
    }
    if config.workspace.output_layout == OutputLayout::Shared
        && config.pipeline.max_concurrent > 1
    {
        return Err(invalid(
            "pipeline.max_concurrent must be 1 with workspace.output_layout = \"shared\"; use \"per_job\" for concurrent jobs",
        ));
    }

    let timeouts = [
        ("pipeline.timeout_secs", config.pipeline.timeout_secs),
        ("fetcher.timeout_secs", config.fetcher.timeout_secs),
        (
            "provisioner.install_timeout_secs",
            config.provisioner.install_timeout_secs,
        ),
        (
            "provisioner.query_timeout_secs",
            config.provisioner.query_timeout_secs,
        ),
        (
            "provisioner.model.download_timeout_secs",
            config.provisioner.model.download_timeout_secs,
        ),
        (
            "orchestrator.request_timeout_secs",
            config.orchestrator.request_timeout_secs,
        ),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(invalid(format!("{} cannot be 0", name)));
        }
    }

    if config.provisioner.pip_command.is_empty() {
        return Err(invalid("provisioner.pip_command cannot be empty"));
    }
    if config.fetcher.max_bytes == 0 {
        return Err(invalid("fetcher.max_bytes cannot be 0"));
    }

    let model = &config.provisioner.model;
    if model.url.trim().is_empty() {
        return Err(invalid("provisioner.model.url cannot be empty"));
    }
    if model.file_name.contains('/') || model.file_name.contains('\\') {
        return Err(invalid("provisioner.model.file_name must be a bare file name"));
    }
    if let Some(sha) = &model.sha256 {
        if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(
                "provisioner.model.sha256 must be 64 hexadecimal characters",
            ));
        }
    }

    for set in &config.provisioner.packages {
        if set.packages.is_empty() {
            return Err(invalid(format!(
                "provisioner package set '{}' lists no packages",
                set.name
            )));
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}
