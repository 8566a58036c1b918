//! # relay-adapters
//!
//! Normalizes heterogeneous raw stream chunks into
//! `relay_core::Event`s, runs the optional before/after/error interceptor
//! chain, and detects the five recognized tool-call JSON shapes. Nothing here
//! drives a stream or decides retry/fallback — that's `relay-runtime`'s job.
//! This crate only classifies and reshapes chunks it's handed.

#![deny(unsafe_code)]

pub mod adapter;
pub mod interceptor;
pub mod raw;
pub mod registry;
pub mod tool_call;

pub use adapter::{GenericTextAdapter, NativeAdapter, StreamAdapter};
pub use interceptor::{Interceptor, InterceptorChain};
pub use raw::{AdapterError, RawChunk};
pub use registry::{resolve_adapter, AdapterRegistry, AdapterSource};
pub use tool_call::{detect_tool_call, detect_tool_result, DetectedToolCall, DetectedToolResult};
