//! The raw chunk shapes a stream factory can hand back, before any adapter
//! has classified them.

use relay_core::event::Event;

/// One unclassified item pulled from a caller-supplied stream factory.
/// Mirrors the three raw shapes step 3 distinguishes before adapter
/// detection: an already-typed handle, a generic structured chunk, and a bare
/// text fragment (the "generic iterable" fallback).
#[derive(Clone, Debug, PartialEq)]
pub enum RawChunk {
    /// Already a `relay_core::Event` — the "native `textStream`/ `fullStream`
    /// handle" case. No normalization needed beyond passthrough.
    Native(Event),
    /// A structured JSON chunk whose shape determines how it maps to an `Event`
    /// (tool-call shapes, role-tagged messages,...).
    Json(serde_json::Value),
    /// A bare text fragment — the generic-iterable fallback when the source is
    /// "just strings".
    Text(String),
}

/// Adapter-layer failures. Every variant maps to a fatal `INTERNAL` error at
/// the driver.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// No adapter — explicit, native, registry, or generic — could classify this
    /// chunk.
    #[error("no adapter could classify this chunk")]
    NoAdapterMatched,
    /// A registered adapter claimed it could handle the chunk but failed while
    /// normalizing it.
    #[error("adapter {adapter:?} failed to normalize chunk: {message}")]
    NormalizationFailed {
        /// Name of the adapter that failed.
        adapter: String,
        /// What went wrong.
        message: String,
    },
}
