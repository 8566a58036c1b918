//! Adapter detection registry and the four-tier precedence resolver: (1)
//! explicit adapter, (2) native `textStream`/`fullStream` handle, (3)
//! registry detection, (4) generic iterable. Resolution failure becomes a
//! fatal internal error.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::adapter::{GenericTextAdapter, NativeAdapter, StreamAdapter};
use crate::raw::{AdapterError, RawChunk};

/// An ordered collection of adapters consulted during tier 3 (registry
/// detection). First match wins, in registration order.
pub struct AdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn StreamAdapter>>>,
}

impl AdapterRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { adapters: RwLock::new(Vec::new()) }
    }

    /// Append an adapter to the end of the detection order.
    pub fn register(&self, adapter: Arc<dyn StreamAdapter>) {
        self.adapters.write().push(adapter);
    }

    /// Remove every adapter with this name. Returns how many were removed.
    pub fn unregister(&self, name: &str) -> usize {
        let mut adapters = self.adapters.write();
        let before = adapters.len();
        adapters.retain(|a| a.name() != name);
        before - adapters.len()
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    /// Whether the registry has no adapters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }

    fn detect(&self, chunk: &RawChunk) -> Option<Arc<dyn StreamAdapter>> {
        self.adapters.read().iter().find(|a| a.can_handle(chunk)).cloned()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the adapter that handled a chunk came from, for logging/ telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterSource {
    /// The caller passed an adapter explicitly (`RunOptions::adapter`).
    Explicit,
    /// The chunk was already a native `relay_core::Event`.
    Native,
    /// An adapter in the registry recognized the chunk's shape.
    Registry,
    /// No adapter claimed the chunk; it fell through to the generic text
    /// fallback.
    Generic,
}

/// Resolve which adapter should normalize `chunk`, following the
/// precedence: explicit, then native, then registry detection, then the
/// generic-iterable fallback.
///
/// # Errors
///
/// Returns `AdapterError::NoAdapterMatched` if every tier is exhausted —
/// callers convert this to a fatal `INTERNAL` error.
pub fn resolve_adapter(
    explicit: Option<&Arc<dyn StreamAdapter>>,
    chunk: &RawChunk,
    registry: &AdapterRegistry,
) -> Result<(Arc<dyn StreamAdapter>, AdapterSource), AdapterError> {
    if let Some(adapter) = explicit {
        return Ok((Arc::clone(adapter), AdapterSource::Explicit));
    }

    let native = NativeAdapter;
    if native.can_handle(chunk) {
        return Ok((Arc::new(native), AdapterSource::Native));
    }

    if let Some(adapter) = registry.detect(chunk) {
        return Ok((adapter, AdapterSource::Registry));
    }

    let generic = GenericTextAdapter;
    if generic.can_handle(chunk) {
        return Ok((Arc::new(generic), AdapterSource::Generic));
    }

    Err(AdapterError::NoAdapterMatched)
}
