//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover the public address per family
//! - [`DnsProvider`]: Read and update DNS records via provider APIs
//! - [`StateStore`]: Persist the settings and reconciliation state
//! - [`Notifier`]: Deliver alerts about cycle outcomes

pub mod address_resolver;
pub mod dns_provider;
pub mod notifier;
pub mod state_store;

pub use address_resolver::{AddressFamily, AddressResolver, ResolvedAddress};
pub use dns_provider::{DnsProvider, ManagedRecord, Zone};
pub use notifier::{NoopNotifier, Notification, Notifier, Priority};
pub use state_store::StateStore;
