//! Streaming reliability runtime: attempt/retry/fallback/resume control flow
//! around one chunk stream, with guardrail enforcement, drift detection,
//! checkpointing, and an observability event catalog layered on top. [`run`]
//! is the one entry point. It takes a [`RunOptions`] built against a
//! [`StreamFactory`] and returns a [`RunHandle`] immediately; the session
//! itself drives on a spawned task. A caller drains [`RunHandle::events`] for
//! the live token/tool/progress sequence and `await`s [`RunHandle::finish`]
//! for the terminal [`RunOutcome`].

#![deny(unsafe_code)]

pub mod clock;
pub mod driver;
pub mod error;
pub mod options;
pub mod result;
pub mod tool_calls;

pub use driver::run;
pub use error::StreamError;
pub use options::{
    ChunkResult, ChunkStream, InterceptorOptions, RunInterceptor, RunOptions, StreamFactory,
};
pub use result::{RunHandle, RunOutcome, RunSummary, TelemetryView};
pub use tool_calls::ToolCallTracker;

// Re-exported so an embedder can build a `RunOptions` without a direct
// dependency on every crate in the workspace.
pub use relay_adapters::{AdapterRegistry, GenericTextAdapter, NativeAdapter, StreamAdapter};
pub use relay_checkpoint::OverlapOptions;
pub use relay_core::{Event, GuardrailRule, RelayError, RetryConfig, SessionSnapshot, SessionState};
pub use relay_events::LegacyCallbacks;
