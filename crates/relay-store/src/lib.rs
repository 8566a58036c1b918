//! # relay-store
//!
//! The event-store contract, a small set of pluggable adapters
//! (in-memory, file, composite, TTL-filtered), a process-level adapter
//! registry, and the deterministic replayer. `relay-events` produces the
//! envelopes; this crate only knows how to persist and re-emit them. Nothing
//! here evaluates guardrails, retries, or timeouts — the replayer is a pure
//! function over what was recorded.

#![deny(unsafe_code)]

pub mod adapters;
pub mod registry;
pub mod replay;
pub mod store;

pub use registry::StoreRegistry;
pub use replay::{compare_replays, ReplayComparison, ReplayOptions, ReplayOutcome, Replayer};
pub use store::{EventStore, StoreError};

pub use adapters::composite::CompositeStore;
pub use adapters::file::FileStore;
pub use adapters::memory::MemoryStore;
pub use adapters::ttl::TtlStore;
