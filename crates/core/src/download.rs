//! Streaming HTTP download into a local file.
//!
//! Shared by the asset fetcher and the model provisioner. Bytes are streamed
//! to disk as they arrive and the destination file is owned by a
//! [`PartialFile`] guard until the caller commits it, so an error, a timeout
//! or a dropped future never leaves a half-written file behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Errors from a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// Connection, TLS or protocol failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The body exceeded the configured limit.
    #[error("response exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The body was empty.
    #[error("response body was empty")]
    Empty,

    /// The whole download did not finish in time.
    #[error("download timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Local write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether the failure came from the remote side rather than local disk.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Progress callback: `(bytes_written, total_if_known)`.
pub type DownloadProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// What a finished download looked like.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub bytes: u64,
    pub content_type: Option<String>,
}

/// A file that is deleted on drop unless committed.
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file; the guard no longer removes it.
    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial file"),
        }
    }
}

/// Streams `url` into the file guarded by `dest`.
///
/// The caller decides whether to commit the guard; this function only
/// writes and flushes. `max_bytes` is checked against the advertised length
/// first and then against the bytes actually received.
pub async fn stream_to_file(
    client: &Client,
    url: &str,
    dest: &PartialFile,
    max_bytes: Option<u64>,
    timeout: Duration,
    progress: Option<DownloadProgressFn<'_>>,
) -> Result<DownloadSummary, DownloadError> {
    let transfer = async {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        if let (Some(limit), Some(len)) = (max_bytes, total) {
            if len > limit {
                return Err(DownloadError::TooLarge { limit });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut file = tokio::fs::File::create(dest.path()).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            written += bytes.len() as u64;
            if let Some(limit) = max_bytes {
                if written > limit {
                    return Err(DownloadError::TooLarge { limit });
                }
            }
            file.write_all(&bytes).await?;
            if let Some(report) = progress {
                report(written, total);
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if written == 0 {
            return Err(DownloadError::Empty);
        }

        Ok(DownloadSummary {
            bytes: written,
            content_type,
        })
    };

    match tokio::time::timeout(timeout, transfer).await {
        Ok(result) => result,
        Err(_) => Err(DownloadError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.part");
        std::fs::write(&path, b"partial").unwrap();

        {
            let _guard = PartialFile::new(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_file_kept_after_commit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.bin");
        std::fs::write(&path, b"complete").unwrap();

        let guard = PartialFile::new(&path);
        let kept = guard.commit();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_missing_is_fine() {
        let temp = TempDir::new().unwrap();
        let _guard = PartialFile::new(temp.path().join("never-written"));
    }

    #[test]
    fn test_error_classification() {
        assert!(DownloadError::Status { status: 404 }.is_remote());
        assert!(DownloadError::Timeout { timeout_secs: 5 }.is_remote());
        assert!(!DownloadError::Io(std::io::Error::other("disk")).is_remote());
    }
}
