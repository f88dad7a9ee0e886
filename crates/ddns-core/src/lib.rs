// # ddns-core
//
// Core library of the dynamic DNS updater.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressResolver**: Trait for discovering the public IPv4/IPv6 address
// - **DnsProvider**: Trait for listing and updating DNS records via provider APIs
// - **StateStore**: Trait for loading and saving settings plus reconciliation state
// - **Notifier**: Trait for delivering alerts
// - **DdnsEngine**: Core engine running the resolve → decide → update → persist cycle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Idempotency**: Last-known addresses make repeated cycles no-ops
// 3. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod status;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, NotificationConfig};
pub use engine::{CycleKind, CycleReport, DdnsEngine, EngineEvent};
pub use error::{Error, Result};
pub use state::{DdnsDocument, FileStateStore, MemoryStateStore};
pub use status::{Health, StatusReport};
pub use traits::{AddressFamily, AddressResolver, DnsProvider, Notifier, StateStore};
