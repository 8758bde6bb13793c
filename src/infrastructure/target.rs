//! Target validation and normalization.
//!
//! Scan targets are untrusted input aimed at a network client, so this is
//! also the SSRF boundary: loopback, private, and link-local destinations
//! are refused both as literal hostnames and as resolved addresses.

use std::net::IpAddr;

use url::Url;

use crate::domain::value_objects::ScanTarget;

/// Validation failures; all map to a caller-visible 400.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target URL: {0}")]
    Parse(String),
    #[error("unsupported scheme '{0}': only http and https targets can be scanned")]
    Scheme(String),
    #[error("target URL has no host")]
    MissingHost,
    #[error("target address {0} is in a private or internal range")]
    DisallowedAddress(IpAddr),
    #[error("hostname resolution failed for '{host}': {message}")]
    Resolution { host: String, message: String },
}

/// A parsed target that has passed syntactic and literal-address checks but
/// has not been resolved yet.
#[derive(Debug, Clone)]
pub struct PendingTarget {
    pub url: Url,
    pub host: String,
    pub port: u16,
}

/// Stateless target validator; safe to share and call concurrently.
#[derive(Debug, Clone, Default)]
pub struct TargetValidator;

impl TargetValidator {
    pub fn new() -> Self {
        Self
    }

    /// Syntactic stage: parse the URL, check the scheme, and refuse literal
    /// private addresses before any DNS traffic happens.
    pub fn parse(&self, raw: &str) -> Result<PendingTarget, TargetError> {
        let url = Url::parse(raw.trim()).map_err(|e| TargetError::Parse(e.to_string()))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(TargetError::Scheme(scheme.to_string()));
        }

        let host = match url.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            Some(url::Host::Ipv4(addr)) => {
                Self::check_address(IpAddr::V4(addr))?;
                addr.to_string()
            }
            Some(url::Host::Ipv6(addr)) => {
                Self::check_address(IpAddr::V6(addr))?;
                addr.to_string()
            }
            None => return Err(TargetError::MissingHost),
        };

        let port = url
            .port_or_known_default()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });

        Ok(PendingTarget { url, host, port })
    }

    /// Resolution stage: resolve the hostname and re-check every address the
    /// name points at.
    pub async fn resolve(&self, pending: PendingTarget) -> Result<ScanTarget, TargetError> {
        let PendingTarget { url, host, port } = pending;

        let resolved = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| TargetError::Resolution {
                host: host.clone(),
                message: e.to_string(),
            })?;

        let addresses: Vec<IpAddr> = resolved.map(|sock| sock.ip()).collect();
        if addresses.is_empty() {
            return Err(TargetError::Resolution {
                host,
                message: "no addresses returned".to_string(),
            });
        }

        for addr in &addresses {
            Self::check_address(*addr)?;
        }

        Ok(ScanTarget {
            url,
            host,
            port,
            addresses,
        })
    }

    /// Both stages in sequence.
    pub async fn validate(&self, raw: &str) -> Result<ScanTarget, TargetError> {
        let pending = self.parse(raw)?;
        self.resolve(pending).await
    }

    fn check_address(addr: IpAddr) -> Result<(), TargetError> {
        if Self::is_disallowed(&addr) {
            return Err(TargetError::DisallowedAddress(addr));
        }
        Ok(())
    }

    fn is_disallowed(addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => {
                v4.is_loopback()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_unspecified()
                    || v4.is_broadcast()
            }
            IpAddr::V6(v6) => {
                let segments = v6.segments();
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local
                    || (segments[0] & 0xfe00) == 0xfc00
                    // fe80::/10 link local
                    || (segments[0] & 0xffc0) == 0xfe80
            }
        }
    }
}
