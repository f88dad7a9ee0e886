// # Address Resolver Trait
//
// Defines the interface for discovering the host's public address.
//
// ## Implementations
//
// - HTTP echo-endpoint race: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{AddressFamily, AddressResolver};
//
// async fn detect(resolver: &dyn AddressResolver) {
//     match resolver.resolve(AddressFamily::V4).await {
//         Some(resolved) => println!("{} via {}", resolved.address, resolved.source),
//         None => println!("IPv4 unavailable"),
//     }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Both families, v4 first
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// The family an address belongs to
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// DNS record type carrying this family (`A` or `AAAA`)
    pub fn record_type(self) -> &'static str {
        match self {
            AddressFamily::V4 => "A",
            AddressFamily::V6 => "AAAA",
        }
    }

    /// Map a DNS record type back to its family
    pub fn from_record_type(record_type: &str) -> Option<Self> {
        match record_type {
            "A" => Some(AddressFamily::V4),
            "AAAA" => Some(AddressFamily::V6),
            _ => None,
        }
    }

    /// Strictly parse `text` as an address literal of this family.
    ///
    /// No partial parsing: surrounding garbage, several addresses, zone
    /// suffixes and HTML bodies are all rejected.
    pub fn parse_literal(self, text: &str) -> Option<IpAddr> {
        match self {
            AddressFamily::V4 => text.parse::<std::net::Ipv4Addr>().ok().map(IpAddr::V4),
            AddressFamily::V6 => text.parse::<std::net::Ipv6Addr>().ok().map(IpAddr::V6),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// An address detected during one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Which family was resolved
    pub family: AddressFamily,
    /// The detected address
    pub address: IpAddr,
    /// The endpoint that answered first
    pub source: String,
}

impl ResolvedAddress {
    /// Create a resolved address, deriving the family from the address
    pub fn new(address: IpAddr, source: impl Into<String>) -> Self {
        Self {
            family: AddressFamily::of(&address),
            address,
            source: source.into(),
        }
    }
}

/// Trait for public address resolvers
///
/// # Contract
///
/// `resolve` never fails past this boundary: every transport error, timeout
/// or malformed answer is absorbed and reported as `None`. Callers treat
/// `None` as "family unknown for this cycle".
///
/// Implementations must be thread-safe; the engine resolves both families
/// concurrently against the same resolver.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the public address for `family`
    async fn resolve(&self, family: AddressFamily) -> Option<ResolvedAddress>;
}
