// # DNS Provider Trait
//
// Defines the interface for reading and updating DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// async fn sync(provider: &dyn DnsProvider) -> ddns_core::Result<()> {
//     for zone in provider.list_zones().await? {
//         for record in provider.list_managed_records(&zone.id).await? {
//             provider.update_record(&record, "203.0.113.7").await?;
//         }
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use super::address_resolver::AddressFamily;

/// A DNS zone owned by the account behind the credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider zone identifier
    pub id: String,
    /// Zone apex name (e.g. "example.com")
    pub name: String,
    /// Provider-reported zone status (e.g. "active")
    pub status: String,
}

/// An A or AAAA record as it currently exists at the provider
///
/// Records are fetched fresh every cycle and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRecord {
    /// Provider record identifier
    pub id: String,
    /// Identifier of the zone holding the record
    pub zone_id: String,
    /// Fully-qualified hostname
    pub name: String,
    /// Family carried by the record (A = v4, AAAA = v6)
    pub family: AddressFamily,
    /// Current record content
    pub content: String,
    /// Whether the provider proxies traffic for this record
    pub proxied: bool,
}

impl ManagedRecord {
    /// Whether the record already points at `address`
    ///
    /// Content is compared as a parsed address so that textual variants of the
    /// same IPv6 address do not trigger a write.
    pub fn points_to(&self, address: &IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .map(|current| current == *address)
            .unwrap_or(false)
    }
}

/// Trait for DNS provider implementations
///
/// # Contract
///
/// - Every method performs exactly one logical API call (pagination aside);
///   no retries, no caching, no background tasks. The engine owns scheduling
///   and the next cycle is the retry mechanism.
/// - `verify_credential` never fails: transport errors and any status other
///   than active yield `false`.
/// - Listing and update calls return [`crate::Error::Provider`] on any
///   non-success response, surfacing the first provider error message.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured credential is active
    async fn verify_credential(&self) -> bool;

    /// List every zone visible to the credential
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// List the A and AAAA records of one zone
    async fn list_managed_records(&self, zone_id: &str) -> Result<Vec<ManagedRecord>, crate::Error>;

    /// Replace the content of one record
    async fn update_record(&self, record: &ManagedRecord, content: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> ManagedRecord {
        ManagedRecord {
            id: "r1".to_string(),
            zone_id: "z1".to_string(),
            name: "home.example.com".to_string(),
            family: AddressFamily::V6,
            content: content.to_string(),
            proxied: false,
        }
    }

    #[test]
    fn points_to_compares_parsed_addresses() {
        let addr: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(record("2001:0db8:0:0:0:0:0:1").points_to(&addr));
        assert!(record("2001:db8::1").points_to(&addr));
        assert!(!record("2001:db8::2").points_to(&addr));
        assert!(!record("not-an-address").points_to(&addr));
    }
}
