//! The `StreamAdapter` trait and the two built-ins the driver always has
//! available (native passthrough, generic text).

use relay_core::event::Event;

use crate::raw::{AdapterError, RawChunk};

/// Classifies and normalizes one kind of raw chunk into an `Event`.
/// Implementations are registered into an `AdapterRegistry` (detection tier)
/// or supplied explicitly by the caller (explicit tier); see step 3's four-
/// tier precedence.
pub trait StreamAdapter: Send + Sync {
    /// Stable name, used in logs and `AdapterError::NormalizationFailed`.
    fn name(&self) -> &str;

    /// Whether this adapter recognizes `chunk`'s shape. Only consulted during
    /// registry detection (tier 3); the explicit and native tiers skip this check
    /// entirely.
    fn can_handle(&self, chunk: &RawChunk) -> bool;

    /// Normalize a chunk this adapter has already claimed (via `can_handle`, or
    /// because it was selected explicitly/natively).
    fn normalize(&self, chunk: RawChunk) -> Result<Event, AdapterError>;
}

/// Tier 2 of the precedence list: the chunk is already a `relay_core::Event`.
/// Always available; never needs registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeAdapter;

impl StreamAdapter for NativeAdapter {
    fn name(&self) -> &str {
        "native"
    }

    fn can_handle(&self, chunk: &RawChunk) -> bool {
        matches!(chunk, RawChunk::Native(_))
    }

    fn normalize(&self, chunk: RawChunk) -> Result<Event, AdapterError> {
        match chunk {
            RawChunk::Native(event) => Ok(event),
            other => Err(AdapterError::NormalizationFailed {
                adapter: self.name().to_owned(),
                message: format!("expected a native chunk, got {other:?}"),
            }),
        }
    }
}

/// Tier 4 of the precedence list: the generic-iterable fallback. Wraps a bare
/// text fragment as a `Token` event with `ts=0` — callers that need real
/// timestamps use an adapter that carries them.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericTextAdapter;

impl StreamAdapter for GenericTextAdapter {
    fn name(&self) -> &str {
        "generic-text"
    }

    fn can_handle(&self, chunk: &RawChunk) -> bool {
        matches!(chunk, RawChunk::Text(_))
    }

    fn normalize(&self, chunk: RawChunk) -> Result<Event, AdapterError> {
        match chunk {
            RawChunk::Text(value) => Ok(Event::Token { value, ts: 0 }),
            other => Err(AdapterError::NormalizationFailed {
                adapter: self.name().to_owned(),
                message: format!("expected a text chunk, got {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_adapter_passes_through() {
        let adapter = NativeAdapter;
        let event = Event::Token { value: "hi".into(), ts: 1 };
        assert!(adapter.can_handle(&RawChunk::Native(event.clone())));
        assert_eq!(adapter.normalize(RawChunk::Native(event.clone())).unwrap(), event);
    }

    #[test]
    fn native_adapter_rejects_non_native_chunks() {
        let adapter = NativeAdapter;
        assert!(!adapter.can_handle(&RawChunk::Text("x".into())));
        assert!(adapter.normalize(RawChunk::Text("x".into())).is_err());
    }

    #[test]
    fn generic_text_adapter_wraps_bare_strings() {
        let adapter = GenericTextAdapter;
        assert!(adapter.can_handle(&RawChunk::Text("hello".into())));
        let event = adapter.normalize(RawChunk::Text("hello".into())).unwrap();
        assert_eq!(event, Event::Token { value: "hello".into(), ts: 0 });
    }
}
