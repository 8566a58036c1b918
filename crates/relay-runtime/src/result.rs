//! The caller-facing handle a run returns, and its terminal summary.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use relay_core::retry::ErrorCategory;
use relay_core::session::SessionSnapshot;
use relay_core::{Event, RelayError};
use relay_events::Dispatcher;

/// Forwards every caller-visible [`Event`] both to the lazy channel
/// [`RunHandle::events`] drains and, if supplied, to a synchronous
/// `on_event` callback — `on_event` is a recognized option alongside the lazy
/// stream, and some embedders want an inline hook rather than polling the
/// channel.
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
    on_event: Option<Arc<dyn Fn(&Event) + Send + Sync>>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Event>, on_event: Option<Arc<dyn Fn(&Event) + Send + Sync>>) -> Self {
        Self { tx, on_event }
    }

    /// Best-effort: a closed receiver or a panicking callback never aborts
    /// the run.
    pub(crate) fn send(&self, event: Event) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
        let _ = self.tx.send(event);
    }
}

/// The terminal state of one run, minus the caller-visible event sequence
/// (which is drained separately through [`RunHandle::events`]). Doubles as
/// the `R` type parameter every run's [`relay_adapters::Interceptor`] chain
/// is instantiated with.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// Final accumulated content, or the last checkpoint on failure.
    pub content: String,
    /// Final token count.
    pub token_count: u64,
    /// Whether the run reached terminal success.
    pub completed: bool,
}

/// What a run ultimately produced: success with its summary, or the rich
/// error surface.
pub type RunOutcome = Result<RunSummary, RelayError>;

/// A read-only telemetry export: a point-in-time view a caller can poll
/// without reaching into the driver's internals.
#[derive(Clone, Debug)]
pub struct TelemetryView {
    /// Current session snapshot.
    pub session: SessionSnapshot,
    /// Error-category counts recorded by the retry manager so far.
    pub error_summary: HashMap<ErrorCategory, usize>,
}

/// The handle [`crate::run`] returns: a lazy caller-visible event stream, a
/// live snapshot, an abort switch, and a way to await the terminal outcome.
pub struct RunHandle {
    events: UnboundedReceiverStream<Event>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    error_summary: Arc<RwLock<HashMap<ErrorCategory, usize>>>,
    cancel: CancellationToken,
    dispatcher: Arc<Dispatcher>,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub(crate) fn new(
        events_rx: mpsc::UnboundedReceiver<Event>,
        snapshot: Arc<RwLock<SessionSnapshot>>,
        error_summary: Arc<RwLock<HashMap<ErrorCategory, usize>>>,
        cancel: CancellationToken,
        dispatcher: Arc<Dispatcher>,
        join: JoinHandle<RunOutcome>,
    ) -> Self {
        Self { events: UnboundedReceiverStream::new(events_rx), snapshot, error_summary, cancel, dispatcher, join }
    }

    /// The lazy, ordered, caller-visible event sequence.
    pub fn events(&mut self) -> &mut UnboundedReceiverStream<Event> {
        &mut self.events
    }

    /// A cheap clone of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    /// A point-in-time telemetry export.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryView {
        TelemetryView { session: self.snapshot(), error_summary: self.error_summary.read().clone() }
    }

    /// Register an additional observability sink after the run has already
    /// started.
    pub fn register_sink(&self, sink: Arc<dyn relay_events::Sink>) {
        self.dispatcher.register(sink);
    }

    /// Request an abort. Idempotent: calling this more than once, or after the
    /// run has already finished, is a no-op.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to reach a terminal state and return its outcome.
    /// Dropping the handle without calling this leaves the spawned task
    /// running to completion in the background.
    ///
    /// # Panics
    ///
    /// Panics if the driver task itself panicked.
    pub async fn finish(self) -> RunOutcome {
        self.join.await.expect("relay-runtime driver task panicked")
    }
}
