//! Model artifact verification and download.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::download::{stream_to_file, DownloadError, DownloadProgressFn, PartialFile};

use super::error::ProvisionError;
use super::types::{ModelArtifact, ProvisionEvent, ProvisionEventCallback};

/// Progress events are emitted at most once per this many bytes.
const PROGRESS_STEP_BYTES: u64 = 16 * 1024 * 1024;

/// Checks that a model file is complete.
///
/// Returns `Ok(None)` when the file is valid, `Ok(Some(reason))` when it is
/// missing or incomplete.
pub async fn check_model_file(
    path: &Path,
    min_size_bytes: u64,
    sha256: Option<&str>,
) -> Result<Option<String>, ProvisionError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Some(format!("{} does not exist", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    if !meta.is_file() {
        return Ok(Some(format!("{} is not a regular file", path.display())));
    }

    if meta.len() == 0 || meta.len() < min_size_bytes {
        return Ok(Some(format!(
            "size {} bytes is below the minimum of {} bytes",
            meta.len(),
            min_size_bytes
        )));
    }

    if let Some(expected) = sha256 {
        let actual = sha256_file(path).await?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Ok(Some(format!(
                "checksum mismatch: expected {}, got {}",
                expected, actual
            )));
        }
    }

    Ok(None)
}

/// Hex SHA-256 of a file, read in 1 MiB chunks.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn part_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "model".to_string());
    path.with_file_name(format!("{}.part", file_name))
}

/// Downloads the model to `<path>.part`, verifies it and renames it into place.
///
/// On any failure the partial file is removed and the final path is untouched.
pub async fn download_model(
    client: &Client,
    model: &ModelArtifact,
    events: Option<&ProvisionEventCallback>,
) -> Result<(), ProvisionError> {
    if let Some(parent) = model.path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let guard = PartialFile::new(part_path(&model.path));
    info!(dependency = %model.name, url = %model.url, "Downloading model");

    let last_reported = AtomicU64::new(0);
    let report = |downloaded: u64, total: Option<u64>| {
        let Some(cb) = events else { return };
        let last = last_reported.load(Ordering::Relaxed);
        let finished = total.is_some_and(|t| downloaded >= t);
        if downloaded - last >= PROGRESS_STEP_BYTES || finished {
            last_reported.store(downloaded, Ordering::Relaxed);
            cb(&ProvisionEvent::DownloadProgress {
                dependency: model.name.clone(),
                downloaded_bytes: downloaded,
                total_bytes: total,
            });
        }
    };

    let report_fn: DownloadProgressFn<'_> = &report;

    let summary = stream_to_file(
        client,
        &model.url,
        &guard,
        None,
        model.download_timeout,
        Some(report_fn),
    )
    .await
    .map_err(|e| match e {
        DownloadError::Timeout { timeout_secs } => {
            ProvisionError::timeout(&model.name, "download", timeout_secs)
        }
        other => ProvisionError::Download {
            dependency: model.name.clone(),
            source: other,
        },
    })?;

    if let Some(reason) =
        check_model_file(guard.path(), model.min_size_bytes, model.sha256.as_deref()).await?
    {
        warn!(dependency = %model.name, %reason, "Downloaded model rejected");
        return Err(ProvisionError::verification_failed(&model.name, reason));
    }

    tokio::fs::rename(guard.path(), &model.path).await?;
    guard.commit();

    info!(
        dependency = %model.name,
        bytes = summary.bytes,
        path = %model.path.display(),
        "Model downloaded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let reason = check_model_file(&temp.path().join("model.onnx"), 1, None)
            .await
            .unwrap();
        assert!(reason.unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_empty_file_is_incomplete() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.onnx");
        std::fs::write(&path, b"").unwrap();

        let reason = check_model_file(&path, 0, None).await.unwrap();
        assert!(reason.unwrap().contains("below the minimum"));
    }

    #[tokio::test]
    async fn test_undersized_file_is_incomplete() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.onnx");
        std::fs::write(&path, vec![0u8; 100]).unwrap();

        assert!(check_model_file(&path, 1000, None).await.unwrap().is_some());
        assert!(check_model_file(&path, 100, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checksum_verification() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("model.onnx");
        std::fs::write(&path, b"hello").unwrap();

        // sha256("hello")
        let good = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert!(check_model_file(&path, 1, Some(good)).await.unwrap().is_none());
        assert!(check_model_file(&path, 1, Some(&good.to_uppercase()))
            .await
            .unwrap()
            .is_none());

        let bad = "0".repeat(64);
        let reason = check_model_file(&path, 1, Some(&bad)).await.unwrap().unwrap();
        assert!(reason.contains("checksum mismatch"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/work/models/inswapper_128.onnx")),
            PathBuf::from("/work/models/inswapper_128.onnx.part")
        );
    }
}
