//! Configuration for the asset fetcher.

use serde::{Deserialize, Serialize};

/// Asset fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Timeout for one whole fetch in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Largest accepted asset in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// User-Agent header sent to remote hosts.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept direct links and redirects to loopback, private or link-local
    /// addresses.
    #[serde(default)]
    pub allow_internal_hosts: bool,
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_max_bytes() -> u64 {
    4 * 1024 * 1024 * 1024 // 4 GiB
}

fn default_user_agent() -> String {
    format!("swapd/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_bytes: default_max_bytes(),
            user_agent: default_user_agent(),
            allow_internal_hosts: false,
        }
    }
}

impl FetcherConfig {
    /// Sets the fetch timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the size limit in bytes.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_internal_hosts_allowed(mut self, allow: bool) -> Self {
        self.allow_internal_hosts = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.connect_timeout_secs, 15);
        assert_eq!(config.max_bytes, 4 * 1024 * 1024 * 1024);
        assert!(config.user_agent.starts_with("swapd/"));
        assert!(!config.allow_internal_hosts);
    }

    #[test]
    fn test_builder() {
        let config = FetcherConfig::default().with_timeout(5).with_max_bytes(1024);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_bytes, 1024);
    }
}
