//! Share providers: turning a user-supplied URL into a download URL.

use std::sync::Arc;

use reqwest::Url;

use super::error::FetchError;

/// A share URL resolved to something that can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Provider that recognised the URL.
    pub provider: String,
    /// Provider-specific identifier (file id, or the URL itself).
    pub id: String,
    /// URL of the file bytes.
    pub download_url: String,
    /// URL to retry with when the first answer is an HTML interstitial.
    pub confirm_url: Option<String>,
}

/// Recognises one family of share URLs.
///
/// Implementations must be pure: resolving never touches the network.
pub trait ShareProvider: Send + Sync {
    /// Provider name used in logs and metrics.
    fn name(&self) -> &str;

    /// Whether this provider is responsible for `url`.
    ///
    /// Claiming a URL does not mean it is valid; [`resolve`](Self::resolve)
    /// may still reject it.
    fn claims(&self, url: &Url) -> bool;

    /// Extracts the identifier and builds the download URL.
    fn resolve(&self, url: &Url) -> Result<ResolvedAsset, FetchError>;
}

/// Ordered list of providers; the first one claiming a URL wins.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ShareProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Appends a provider. Earlier providers take precedence.
    pub fn with_provider(mut self, provider: Arc<dyn ShareProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Google Drive first, then plain HTTP(S).
    pub fn standard(allow_internal_hosts: bool) -> Self {
        let direct = if allow_internal_hosts {
            super::DirectUrlProvider::allowing_internal_hosts()
        } else {
            super::DirectUrlProvider::new()
        };
        Self::empty()
            .with_provider(Arc::new(super::GoogleDriveProvider::new()))
            .with_provider(Arc::new(direct))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Parses and resolves `raw`. Never performs I/O.
    pub fn resolve(&self, raw: &str) -> Result<ResolvedAsset, FetchError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FetchError::invalid_reference(raw, "empty reference"));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| FetchError::invalid_reference(raw, e.to_string()))?;

        let provider = self
            .providers
            .iter()
            .find(|p| p.claims(&url))
            .ok_or_else(|| FetchError::invalid_reference(raw, "no provider recognises this URL"))?;

        provider.resolve(&url)
    }
}

impl Default for ProviderRegistry {
    /// The standard providers, refusing internal hosts.
    fn default() -> Self {
        Self::standard(false)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let registry = ProviderRegistry::default();
        assert_eq!(registry.provider_names(), vec!["google_drive", "direct"]);
    }

    #[test]
    fn test_rejects_malformed() {
        let registry = ProviderRegistry::default();
        for raw in ["", "   ", "not a url", "ftp://example.com/a.mp4", "file:///etc/passwd"] {
            let err = registry.resolve(raw).unwrap_err();
            assert!(err.is_invalid_reference(), "{raw:?} gave {err:?}");
        }
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let registry = ProviderRegistry::empty();
        let err = registry.resolve("https://example.com/a.jpg").unwrap_err();
        assert!(err.is_invalid_reference());
    }

    #[test]
    fn test_drive_takes_precedence() {
        let registry = ProviderRegistry::default();
        let resolved = registry
            .resolve("https://drive.google.com/file/d/1AbCdEfGhIjKlMnOp/view?usp=sharing")
            .unwrap();
        assert_eq!(resolved.provider, "google_drive");

        let resolved = registry.resolve("https://cdn.example.com/clip.mp4").unwrap();
        assert_eq!(resolved.provider, "direct");
    }

    #[test]
    fn test_internal_hosts_follow_registry_setting() {
        let err = ProviderRegistry::default()
            .resolve("http://127.0.0.1:8080/clip.mp4")
            .unwrap_err();
        assert!(err.is_invalid_reference());

        let resolved = ProviderRegistry::standard(true)
            .resolve("http://127.0.0.1:8080/clip.mp4")
            .unwrap();
        assert_eq!(resolved.provider, "direct");
    }
}
