//! The in-process dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use relay_core::ids::StreamId;

use crate::catalog::{ObservabilityEnvelope, ObservabilityEvent};
use crate::schema;

/// A registered observability sink. Implementations must not panic —
/// `Dispatcher::emit` does not catch unwinds, and a panicking sink would take
/// the whole session down with it. A sink that can fail internally should
/// swallow and log its own errors.
pub trait Sink: Send + Sync {
    /// Receive one stamped event. Called synchronously from `emit`, in
    /// registration order.
    fn on_event(&self, envelope: &ObservabilityEnvelope);
}

/// Fans a session's observability events out to registered sinks. Owned by
/// the driver for the session's lifetime; its sink list is the one piece of
/// driver state that must tolerate concurrent registration, since a caller
/// may attach a sink (e.g. a metrics bridge) from outside the driving task.
pub struct Dispatcher {
    stream_id: StreamId,
    context: Option<serde_json::Value>,
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    last_ts: AtomicU64,
    strict_schema: bool,
}

impl Dispatcher {
    /// Construct a dispatcher for one session. Schema validation defaults to on
    /// in debug builds and off in release: every emission is checked against
    /// the schema map while developing, without paying for it in production.
    #[must_use]
    pub fn new(stream_id: StreamId, context: Option<serde_json::Value>) -> Self {
        Self {
            stream_id,
            context,
            sinks: RwLock::new(Vec::new()),
            last_ts: AtomicU64::new(0),
            strict_schema: cfg!(debug_assertions),
        }
    }

    /// Force schema validation on or off, overriding the build-profile default.
    /// Tests use this to exercise the validation path regardless of how they're
    /// compiled.
    #[must_use]
    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Register a sink. Safe to call while other threads are emitting.
    pub fn register(&self, sink: Arc<dyn Sink>) {
        self.sinks.write().push(sink);
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// The session this dispatcher is bound to.
    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Stamp and emit one event. `ts` should already be non-decreasing (the
    /// driver's own session clock, `clock_ms`); if a caller passes a value below
    /// the last emitted timestamp regardless, the dispatcher clamps it upward so
    /// the "timestamps non-decreasing" lifecycle invariant always holds for what
    /// sinks actually observe.
    pub fn emit(&self, event: ObservabilityEvent, ts: u64) -> ObservabilityEnvelope {
        let prev = self.last_ts.fetch_max(ts, Ordering::SeqCst);
        let ts = ts.max(prev);

        let envelope =
            ObservabilityEnvelope { ts, stream_id: self.stream_id.clone(), context: self.context.clone(), event };

        if self.strict_schema {
            if let Err(reason) = schema::validate(&envelope) {
                warn!(stream_id = %envelope.stream_id, reason, "observability event failed schema validation");
            }
        }

        for sink in self.sinks.read().iter() {
            sink.on_event(&envelope);
        }

        envelope
    }
}
