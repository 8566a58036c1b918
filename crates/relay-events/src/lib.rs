//! # relay-events
//!
//! The fixed observability-event catalog, the in-process
//! dispatcher that stamps and fans events out to registered sinks, and the
//! legacy-callback sink that adapts a subset of the catalog into the twelve
//! `on_*` callbacks a caller can pass on `Run invocation`.
//!
//! `relay_core::event::Event` is the caller-visible *content* stream (tokens,
//! messages, completion). This crate's `ObservabilityEvent` is a superset
//! that also covers internal transitions (`ATTEMPT_START`,
//! `RETRY_ATTEMPT`,...) that never reach the caller's lazy iterator but do
//! reach sinks, the legacy callbacks, and — when recording is enabled —
//! `relay-store`.

#![deny(unsafe_code)]

pub mod catalog;
pub mod dispatcher;
pub mod legacy;
pub mod schema;

pub use catalog::{ObservabilityEnvelope, ObservabilityEvent};
pub use dispatcher::{Dispatcher, Sink};
pub use legacy::LegacyCallbacks;
