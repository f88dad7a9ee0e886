// # State Store Trait
//
// Defines the interface for loading and persisting the DDNS document.
//
// ## Purpose
//
// The document holds both the user's settings and the engine-written
// reconciliation state (last-known addresses, last success, last status).
// The engine reads it once at the start of a cycle and writes a complete
// new value at the end; there are no partial updates.
//
// ## Implementations
//
// - File-based: JSON with atomic replace and backup recovery
// - Memory: for tests and embedding

use async_trait::async_trait;

use crate::state::DdnsDocument;

/// Trait for state store implementations
///
/// # Single Writer
///
/// The engine runs one cycle at a time, so a store sees at most one
/// `load` → `save` sequence in flight per process. Stores are not required
/// to guard against several processes sharing the same backing file.
///
/// # Durability
///
/// `save` must be atomic: after a crash the store holds either the previous
/// document or the new one, never a mix.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the current document
    ///
    /// # Returns
    ///
    /// - `Ok(Some(doc))`: The stored document
    /// - `Ok(None)`: Nothing has been stored yet
    /// - `Err(Error)`: Storage error
    async fn load(&self) -> Result<Option<DdnsDocument>, crate::Error>;

    /// Replace the stored document
    async fn save(&self, document: &DdnsDocument) -> Result<(), crate::Error>;
}
