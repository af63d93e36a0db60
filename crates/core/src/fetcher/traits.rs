//! Fetcher trait and its input type.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::FetchError;

/// A remote asset and where it should land locally.
///
/// `dest` is chosen by the caller (always inside a job directory); the
/// remote never influences the local file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub url: String,
    pub dest: PathBuf,
}

impl AssetReference {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
        }
    }
}

/// Retrieves a remote asset into a local file.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Checks the reference without touching the network.
    fn validate(&self, reference: &AssetReference) -> Result<(), FetchError>;

    /// Downloads the asset to `reference.dest` and returns that path.
    ///
    /// On success the file exists and is non-empty. On failure, including
    /// when the returned future is dropped, no file is left at `dest`.
    async fn fetch(&self, reference: &AssetReference) -> Result<PathBuf, FetchError>;
}
