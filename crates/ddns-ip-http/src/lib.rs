// # HTTP Address Resolver
//
// This crate provides the HTTP-based AddressResolver for the DDNS system.
//
// ## Architecture
//
// Every lookup races a list of public "what is my IP" echo endpoints:
//
// - One GET per candidate, all issued concurrently
// - Each request bounded by its own timeout
// - The trimmed body must be exactly one address literal of the asked family
// - The first answer that is HTTP-successful and valid wins; the rest are
//   dropped
//
// Resolution never raises past this crate: when every candidate fails the
// family is reported as unavailable (`None`).

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;

use ddns_core::traits::{AddressFamily, AddressResolver, ResolvedAddress};
use ddns_core::{Error, Result};

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default IPv4 echo endpoints
pub const DEFAULT_V4_ENDPOINTS: &[&str] = &[
    "https://ip4.ip8.com/",
    "https://4.tnedi.me",
    "https://api.ipify.org",
    "https://checkip.amazonaws.com",
    "https://ipinfo.io/ip",
    "https://ipv4.icanhazip.com/",
    "https://ipv4.seeip.org",
    "https://v4.ident.me/",
];

/// Default IPv6 echo endpoints
pub const DEFAULT_V6_ENDPOINTS: &[&str] = &[
    "https://ip6.ip8.com/",
    "https://6.tnedi.me",
    "https://api64.ipify.org/",
    "https://ipv6.icanhazip.com/",
    "https://ipv6.seeip.org",
    "https://v6.ident.me/",
    "https://v6.ipinfo.io/ip",
];

/// Race-based resolver over HTTP echo endpoints
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    /// Candidates for IPv4
    v4_endpoints: Vec<String>,

    /// Candidates for IPv6
    v6_endpoints: Vec<String>,

    /// Bound on each individual request
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver over the default endpoint lists
    pub fn new() -> Self {
        Self::with_endpoints(
            DEFAULT_V4_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_V6_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Create a resolver over custom endpoint lists
    pub fn with_endpoints(v4_endpoints: Vec<String>, v6_endpoints: Vec<String>) -> Self {
        Self {
            v4_endpoints,
            v6_endpoints,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            client: reqwest::Client::new(),
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Candidates for `family`
    pub fn endpoints(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.v4_endpoints,
            AddressFamily::V6 => &self.v6_endpoints,
        }
    }

    /// Race every candidate; first valid answer wins
    async fn try_resolve(&self, family: AddressFamily) -> Result<ResolvedAddress> {
        let mut race: FuturesUnordered<_> = self
            .endpoints(family)
            .iter()
            .map(|endpoint| self.query(endpoint, family))
            .collect();

        while let Some(outcome) = race.next().await {
            match outcome {
                Ok(resolved) => {
                    tracing::debug!(
                        "{} resolved to {} via {}",
                        family,
                        resolved.address,
                        resolved.source
                    );
                    return Ok(resolved);
                }
                Err(e) => tracing::trace!("{} candidate rejected: {}", family, e),
            }
        }

        Err(Error::resolution_unavailable(family))
    }

    /// Query a single candidate
    async fn query(&self, endpoint: &str, family: AddressFamily) -> Result<ResolvedAddress> {
        let request = async {
            let response = self
                .client
                .get(endpoint)
                .send()
                .await
                .map_err(|e| Error::http(format!("{}: request failed: {}", endpoint, e)))?;

            if !response.status().is_success() {
                return Err(Error::http(format!(
                    "{}: HTTP error: {}",
                    endpoint,
                    response.status()
                )));
            }

            response
                .text()
                .await
                .map_err(|e| Error::http(format!("{}: failed to read response: {}", endpoint, e)))
        };

        let body = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| Error::http(format!("{}: timed out after {:?}", endpoint, self.timeout)))??;

        let address = family.parse_literal(body.trim()).ok_or_else(|| {
            Error::invalid_input(format!("{}: not a single {} literal", endpoint, family))
        })?;

        Ok(ResolvedAddress::new(address, endpoint))
    }
}

impl Default for HttpAddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self, family: AddressFamily) -> Option<ResolvedAddress> {
        match self.try_resolve(family).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                // IPv6 is often unavailable
                match family {
                    AddressFamily::V4 => tracing::error!("{} from all sources", e),
                    AddressFamily::V6 => tracing::warn!("{} from all sources", e),
                }
                None
            }
        }
    }
}
