//! Mock asset fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::fetcher::{AssetFetcher, AssetReference, FetchError, ProviderRegistry};

/// How a mocked fetch should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFetchFailure {
    /// Remote answered with this HTTP status.
    Status(u16),
    /// Remote sent an empty body.
    Empty,
    /// Fetch timed out.
    Timeout,
}

impl MockFetchFailure {
    fn to_error(&self) -> FetchError {
        match self {
            Self::Status(status) => FetchError::Status {
                provider: "mock".to_string(),
                status: *status,
            },
            Self::Empty => FetchError::Empty,
            Self::Timeout => FetchError::Timeout { timeout_secs: 1 },
        }
    }
}

/// Mock implementation of the AssetFetcher trait.
///
/// References are validated with the real provider registry, so malformed
/// links behave exactly as in production. Valid links are "downloaded" by
/// writing fixed bytes to the destination.
///
/// # Example
///
/// ```rust,ignore
/// use faceswap_core::testing::{MockFetcher, MockFetchFailure};
///
/// let fetcher = MockFetcher::new();
/// fetcher.fail_url("https://example.com/video.mp4", MockFetchFailure::Status(404));
///
/// // ... run a job ...
/// assert_eq!(fetcher.fetch_count(), 2);
/// ```
#[derive(Debug)]
pub struct MockFetcher {
    registry: ProviderRegistry,
    fetched: Mutex<Vec<AssetReference>>,
    failures: Mutex<HashMap<String, MockFetchFailure>>,
    content: Mutex<Vec<u8>>,
    delay: Mutex<Option<Duration>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::default(),
            fetched: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            content: Mutex::new(b"mock asset bytes".to_vec()),
            delay: Mutex::new(None),
        }
    }

    /// Makes fetches of `url` fail.
    pub fn fail_url(&self, url: impl Into<String>, failure: MockFetchFailure) {
        lock(&self.failures).insert(url.into(), failure);
    }

    /// Bytes written for every successful fetch.
    pub fn set_content(&self, content: impl Into<Vec<u8>>) {
        *lock(&self.content) = content.into();
    }

    /// Simulated transfer time.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Fetches started (validated references only).
    pub fn fetched(&self) -> Vec<AssetReference> {
        lock(&self.fetched).clone()
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.fetched).len()
    }
}

#[async_trait]
impl AssetFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    fn validate(&self, reference: &AssetReference) -> Result<(), FetchError> {
        self.registry.resolve(&reference.url).map(|_| ())
    }

    async fn fetch(&self, reference: &AssetReference) -> Result<PathBuf, FetchError> {
        self.validate(reference)?;
        lock(&self.fetched).push(reference.clone());

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = lock(&self.failures).get(&reference.url).cloned();
        if let Some(failure) = failure {
            return Err(failure.to_error());
        }

        let content = lock(&self.content).clone();
        tokio::fs::write(&reference.dest, content).await?;
        Ok(reference.dest.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_writes_content() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.set_content(b"jpeg".to_vec());

        let reference = AssetReference::new("https://example.com/a.jpg", dir.path().join("a.jpg"));
        let path = fetcher.fetch(&reference).await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"jpeg");
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.fail_url("https://example.com/v.mp4", MockFetchFailure::Status(404));

        let reference = AssetReference::new("https://example.com/v.mp4", dir.path().join("v.mp4"));
        let err = fetcher.fetch(&reference).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(!dir.path().join("v.mp4").exists());
    }

    #[tokio::test]
    async fn test_invalid_reference_is_not_recorded() {
        let fetcher = MockFetcher::new();
        let reference = AssetReference::new("nonsense", "/tmp/never");
        assert!(fetcher.fetch(&reference).await.unwrap_err().is_invalid_reference());
        assert_eq!(fetcher.fetch_count(), 0);
    }
}
