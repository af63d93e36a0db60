//! Error types for the fetcher module.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while fetching an asset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference is not a well-formed share URL for any provider.
    #[error("invalid reference '{url}': {reason}")]
    InvalidReference { url: String, reason: String },

    /// Remote answered with a non-success status.
    #[error("{provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    /// Remote served an HTML page instead of the file.
    #[error("{provider} served an HTML page instead of the file (sharing disabled or quota exceeded?)")]
    NotAFile { provider: String },

    /// Fetch did not finish in time.
    #[error("fetch timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Asset larger than the configured limit.
    #[error("asset exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Remote sent an empty body.
    #[error("asset is empty")]
    Empty,

    /// Connection or protocol failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Creates an invalid reference error.
    pub fn invalid_reference(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the input was rejected before any network activity.
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidReference { .. })
    }

    pub(crate) fn from_download(provider: &str, err: DownloadError) -> Self {
        match err {
            DownloadError::Status { status } => Self::Status {
                provider: provider.to_string(),
                status,
            },
            DownloadError::Request(e) => Self::Request(e.to_string()),
            DownloadError::TooLarge { limit } => Self::TooLarge { limit },
            DownloadError::Empty => Self::Empty,
            DownloadError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            DownloadError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::invalid_reference("not a url", "relative URL without a base");
        assert_eq!(
            err.to_string(),
            "invalid reference 'not a url': relative URL without a base"
        );
        assert!(err.is_invalid_reference());
    }

    #[test]
    fn test_from_download() {
        let err = FetchError::from_download("google_drive", DownloadError::Status { status: 404 });
        assert_eq!(err.to_string(), "google_drive returned HTTP 404");
        assert!(!err.is_invalid_reference());

        let err = FetchError::from_download("direct", DownloadError::Timeout { timeout_secs: 9 });
        assert!(matches!(err, FetchError::Timeout { timeout_secs: 9 }));
    }
}
