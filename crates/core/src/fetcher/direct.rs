//! Plain HTTP(S) links.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;

use super::error::FetchError;
use super::provider::{ResolvedAsset, ShareProvider};

/// Downloads any `http`/`https` URL as-is.
///
/// Links pointing at this machine or the local network (loopback, private,
/// link-local or unspecified addresses, `localhost`) are rejected unless
/// internal hosts are explicitly allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectUrlProvider {
    allow_internal_hosts: bool,
}

impl DirectUrlProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts links to internal hosts too. Meant for trusted deployments
    /// and tests against a local server.
    pub fn allowing_internal_hosts() -> Self {
        Self {
            allow_internal_hosts: true,
        }
    }
}

impl ShareProvider for DirectUrlProvider {
    fn name(&self) -> &str {
        "direct"
    }

    fn claims(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn resolve(&self, url: &Url) -> Result<ResolvedAsset, FetchError> {
        if url.host_str().map_or(true, str::is_empty) {
            return Err(FetchError::invalid_reference(url.as_str(), "URL has no host"));
        }
        if !self.allow_internal_hosts && is_internal_host(url) {
            return Err(FetchError::invalid_reference(
                url.as_str(),
                "URL points at an internal host",
            ));
        }

        Ok(ResolvedAsset {
            provider: self.name().to_string(),
            id: url.as_str().to_string(),
            download_url: url.as_str().to_string(),
            confirm_url: None,
        })
    }
}

/// Whether `url` names this machine or a private network address.
///
/// Only literal addresses and `localhost` names are recognised; host names
/// are not resolved.
pub(crate) fn is_internal_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    // IPv6 literals keep their brackets in `host_str`.
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return is_internal_ip(ip);
    }

    let domain = host.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost" || domain.ends_with(".localhost")
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_internal_v4(ip),
        IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
            Some(mapped) => is_internal_v4(mapped),
            None => is_internal_v6(ip),
        },
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10, carrier-grade NAT
        || (a == 100 && (64..128).contains(&b))
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
}
