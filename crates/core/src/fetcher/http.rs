//! HTTP implementation of [`AssetFetcher`].

use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::download::{stream_to_file, DownloadError, DownloadSummary, PartialFile};
use crate::metrics::{FETCHED_BYTES, FETCHES};

use super::config::FetcherConfig;
use super::direct::is_internal_host;
use super::error::FetchError;
use super::provider::{ProviderRegistry, ResolvedAsset};
use super::traits::{AssetFetcher, AssetReference};

/// Same limit as reqwest's default policy.
const MAX_REDIRECTS: usize = 10;

/// Fetches assets over HTTP(S) through a [`ProviderRegistry`].
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
    registry: ProviderRegistry,
}

impl HttpFetcher {
    /// Creates a fetcher with the standard providers.
    ///
    /// Unless `allow_internal_hosts` is set, redirects to internal hosts are
    /// refused as well as direct links to them.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if !config.allow_internal_hosts {
            builder = builder.redirect(redirect::Policy::custom(|attempt| {
                if is_internal_host(attempt.url()) {
                    let url = attempt.url().to_string();
                    attempt.error(format!("redirect to internal host {url}"))
                } else if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else {
                    attempt.follow()
                }
            }));
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            client,
            registry: ProviderRegistry::standard(config.allow_internal_hosts),
            config,
        })
    }

    /// Replaces the provider registry.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    async fn download(
        &self,
        resolved: &ResolvedAsset,
        dest: &PartialFile,
    ) -> Result<u64, FetchError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let deadline = Instant::now() + timeout;

        let summary = self
            .attempt(resolved, &resolved.download_url, dest, timeout)
            .await?;
        if !is_html(&summary) {
            return Ok(summary.bytes);
        }

        let Some(confirm_url) = &resolved.confirm_url else {
            return Err(FetchError::NotAFile {
                provider: resolved.provider.clone(),
            });
        };

        debug!(
            provider = %resolved.provider,
            id = %resolved.id,
            "Got HTML interstitial, retrying with confirmation"
        );

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(FetchError::Timeout {
                timeout_secs: self.config.timeout_secs,
            });
        }

        let summary = self.attempt(resolved, confirm_url, dest, remaining).await?;
        if is_html(&summary) {
            return Err(FetchError::NotAFile {
                provider: resolved.provider.clone(),
            });
        }
        Ok(summary.bytes)
    }

    async fn attempt(
        &self,
        resolved: &ResolvedAsset,
        url: &str,
        dest: &PartialFile,
        timeout: Duration,
    ) -> Result<DownloadSummary, FetchError> {
        stream_to_file(
            &self.client,
            url,
            dest,
            Some(self.config.max_bytes),
            timeout,
            None,
        )
        .await
        .map_err(|e| match e {
            // Always the whole budget, not the remainder.
            DownloadError::Timeout { .. } => FetchError::Timeout {
                timeout_secs: self.config.timeout_secs,
            },
            other => FetchError::from_download(&resolved.provider, other),
        })
    }
}

fn is_html(summary: &DownloadSummary) -> bool {
    summary
        .content_type
        .as_deref()
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn validate(&self, reference: &AssetReference) -> Result<(), FetchError> {
        self.registry.resolve(&reference.url).map(|_| ())
    }

    async fn fetch(&self, reference: &AssetReference) -> Result<PathBuf, FetchError> {
        let resolved = match self.registry.resolve(&reference.url) {
            Ok(resolved) => resolved,
            Err(e) => {
                FETCHES.with_label_values(&["none", "invalid_reference"]).inc();
                return Err(e);
            }
        };

        debug!(
            provider = %resolved.provider,
            id = %resolved.id,
            dest = %reference.dest.display(),
            "Fetching asset"
        );

        let started = Instant::now();
        let guard = PartialFile::new(&reference.dest);

        match self.download(&resolved, &guard).await {
            Ok(bytes) => {
                FETCHES.with_label_values(&[&resolved.provider, "success"]).inc();
                FETCHED_BYTES
                    .with_label_values(&[&resolved.provider])
                    .inc_by(bytes);
                info!(
                    provider = %resolved.provider,
                    bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    dest = %reference.dest.display(),
                    "Asset fetched"
                );
                Ok(guard.commit())
            }
            Err(e) => {
                FETCHES.with_label_values(&[&resolved.provider, "failed"]).inc();
                warn!(provider = %resolved.provider, id = %resolved.id, error = %e, "Fetch failed");
                Err(e)
            }
        }
    }
}
