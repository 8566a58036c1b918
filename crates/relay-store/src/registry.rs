//! Process-level adapter registry, keyed by a string type tag.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::store::{EventStore, StoreError};

type BoxedStore = Arc<dyn EventStore>;
type Factory = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<BoxedStore, StoreError>> + Send>> + Send + Sync>;

fn factories() -> &'static Mutex<HashMap<String, Factory>> {
    static FACTORIES: OnceLock<Mutex<HashMap<String, Factory>>> = OnceLock::new();
    FACTORIES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A process-wide namespace of named `EventStore` factories. All methods
/// operate on one global table — there is exactly one registry per process.
/// `StoreRegistry` itself holds no state; it's a handle onto that global table.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreRegistry;

impl StoreRegistry {
    /// A handle onto the process-wide registry.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Register (or replace) the factory for `type_tag`. The factory returns a
    /// future so both synchronous constructors (wrap in `async move { Ok(...) }`)
    /// and genuinely asynchronous ones (e.g. one that opens a connection) fit the
    /// same signature.
    pub fn register<F, Fut>(&self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BoxedStore, StoreError>> + Send + 'static,
    {
        let boxed: Factory = Arc::new(move || Box::pin(factory()));
        factories().lock().insert(type_tag.into(), boxed);
    }

    /// Remove the factory for `type_tag`. Returns `true` if one was registered.
    pub fn unregister(&self, type_tag: &str) -> bool {
        factories().lock().remove(type_tag).is_some()
    }

    /// Whether a factory is registered for `type_tag`.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        factories().lock().contains_key(type_tag)
    }

    /// Construct a store via the factory registered for `type_tag`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Adapter` if no factory is registered for
    /// `type_tag`, or whatever error the factory itself returns.
    pub async fn create(&self, type_tag: &str) -> Result<BoxedStore, StoreError> {
        let factory = factories()
            .lock()
            .get(type_tag)
            .cloned()
            .ok_or_else(|| StoreError::Adapter(format!("no store adapter registered for {type_tag:?}")))?;
        factory().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    #[tokio::test]
    async fn register_then_create_round_trip() {
        let registry = StoreRegistry::new();
        let tag = format!("memory-test-{}", std::process::id());
        registry.register(tag.clone(), || async { Ok(Arc::new(MemoryStore::new()) as BoxedStore) });
        assert!(registry.contains(&tag));
        let store = registry.create(&tag).await.unwrap();
        assert!(store.list_streams().await.unwrap().is_empty());
        assert!(registry.unregister(&tag));
    }

    #[tokio::test]
    async fn create_with_unknown_tag_errors() {
        let registry = StoreRegistry::new();
        let err = registry.create("definitely-not-registered-xyz").await.unwrap_err();
        assert!(matches!(err, StoreError::Adapter(_)));
    }
}
