// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple, fast state store that doesn't persist across restarts.
// Useful for testing and for embedding the engine in a host that owns
// persistence itself.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First cycle after a restart is a first run (will run an update pass)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::state::DdnsDocument;
use crate::traits::state_store::StateStore;

/// In-memory state store implementation
///
/// Clones share the same document, so a test can keep one handle and give
/// another to the engine.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::config::DdnsConfig;
/// use ddns_core::state::{DdnsDocument, MemoryStateStore};
/// use ddns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DdnsConfig::new("token", vec!["home.example.com".to_string()]);
///     let store = MemoryStateStore::with_document(DdnsDocument::new(config));
///
///     let doc = store.load().await?;
///     assert!(doc.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<DdnsDocument>>>,
}

impl MemoryStateStore {
    /// Create an empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `document`
    pub fn with_document(document: DdnsDocument) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(document))),
        }
    }

    /// Current document, if any
    pub async fn snapshot(&self) -> Option<DdnsDocument> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<DdnsDocument>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, document: &DdnsDocument) -> Result<(), Error> {
        *self.inner.write().await = Some(document.clone());
        Ok(())
    }
}
