//! The run configuration record and the stream-factory seam it drives.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use relay_adapters::{AdapterRegistry, Interceptor, InterceptorChain, StreamAdapter};
use relay_checkpoint::OverlapOptions;
use relay_core::{Event, GuardrailRule, RetryConfig};
use relay_events::LegacyCallbacks;
use relay_guardrails::GuardrailEngine;
use relay_retry::manager::RetryHooks;
use relay_settings::IntervalSettings;
use relay_store::EventStore;

use crate::error::StreamError;
use crate::result::RunSummary;

/// One chunk as it comes off a stream factory, or a classified failure.
pub type ChunkResult = Result<relay_adapters::RawChunk, StreamError>;

/// A boxed, send-able stream of chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ChunkResult> + Send>>;

/// Produces the raw chunk stream for one attempt. `resume_checkpoint` is
/// `Some` when this attempt is resuming from a prior known-good prefix; most
/// factories pass it straight through as the prompt/continuation context for
/// the underlying provider call. Implementations that never resume can ignore
/// the argument.
pub trait StreamFactory: Send + Sync {
    /// Start (or resume) a stream.
    fn start(&self, resume_checkpoint: Option<&str>) -> ChunkStream;
}

impl<F> StreamFactory for F
where
    F: Fn(Option<&str>) -> ChunkStream + Send + Sync,
{
    fn start(&self, resume_checkpoint: Option<&str>) -> ChunkStream {
        self(resume_checkpoint)
    }
}

/// The interceptor pair driving a run: `before` sees (and may rewrite) this
/// configuration snapshot, `after`/`on_error` see the terminal summary.
#[derive(Clone, Debug, Default)]
pub struct InterceptorOptions {
    /// Free-form per-run configuration an interceptor may want to inspect or
    /// rewrite (e.g. a prompt-injection guard editing `meta` before the first
    /// attempt starts).
    pub meta: Option<serde_json::Value>,
    /// Adapter-specific configuration, opaque to the driver.
    pub adapter_options: Option<serde_json::Value>,
}

pub type RunInterceptor = dyn Interceptor<InterceptorOptions, RunSummary>;

/// Configuration for one run. Every field has a sensible default via
/// [`RunOptions::new`] plus `with_*` fluent builders; ambient defaults not
/// set here are filled in from [`relay_settings::load`] at the top of
/// [`crate::run`].
pub struct RunOptions {
    /// Primary stream factory.
    pub stream_factory: Arc<dyn StreamFactory>,
    /// Fallback factories tried in order after the primary is exhausted, never
    /// revisited once passed.
    pub fallback_stream_factories: Vec<Arc<dyn StreamFactory>>,
    /// Guardrail rules active for this run.
    pub guardrails: Vec<GuardrailRule>,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Optional caller override for retry decisions / delay math.
    pub retry_hooks: Option<Arc<dyn RetryHooks>>,
    /// Overall session deadline. `None` defers to `RelaySettings::default_timeout_ms`
    /// rather than disabling the deadline outright.
    pub timeout: Option<Duration>,
    /// First-chunk timeout per attempt.
    pub initial_token_timeout: Duration,
    /// Subsequent-chunk timeout per attempt, measured from the last emitted
    /// token.
    pub inter_token_timeout: Duration,
    /// Caller-supplied abort signal, OR'd with [`crate::RunHandle::abort`].
    pub signal: Option<CancellationToken>,
    /// Additional observability sinks, registered on the dispatcher alongside any
    /// legacy callback adapter.
    pub monitoring: Vec<Arc<dyn relay_events::Sink>>,
    /// Run the drift probe at the drift cadence and on finalization.
    pub detect_drift: bool,
    /// Fail (and offer for retry) a stream that completes with no meaningful
    /// content.
    pub detect_zero_tokens: bool,
    /// Streaming guardrail/drift/checkpoint cadence; falls back to ambient
    /// settings when unset.
    pub check_intervals: Option<IntervalSettings>,
    /// Callback for every caller-visible `Event`.
    pub on_event: Option<Arc<dyn Fn(&Event) + Send + Sync>>,
    /// Legacy per-callback adapter (`on_start`, `on_retry`,...).
    pub legacy_callbacks: Option<Arc<LegacyCallbacks>>,
    /// Whether a fallback/retry may resume from `checkpoint` rather than starting
    /// the new attempt from scratch.
    pub continue_from_last_known_good_token: bool,
    /// Advisory hook invoked with the checkpoint content before a resuming
    /// attempt starts; the hook is advisory only and its return value is not used.
    pub build_continuation_prompt: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    /// Whether a resumed attempt's overlap with the checkpoint should be
    /// deduplicated before forwarding new tokens.
    pub deduplicate_continuation: bool,
    /// Controls for the overlap search.
    pub deduplication_options: OverlapOptions,
    /// Force a specific adapter rather than resolving one per chunk.
    pub adapter: Option<Arc<dyn StreamAdapter>>,
    /// Registry consulted when `adapter` is unset.
    pub adapter_registry: Arc<AdapterRegistry>,
    /// `before`/`after`/`on_error` chain around the whole run.
    pub interceptors: InterceptorChain<InterceptorOptions, RunSummary>,
    /// Caller-supplied immutable context, echoed onto every observability event
    /// and onto `RelayError`.
    pub meta: Option<serde_json::Value>,
    /// Whether to append to `event_store`. `None` defers to
    /// `RelaySettings::recording_enabled`.
    pub record: Option<bool>,
    /// Event store used when recording is enabled. Required if `record` resolves
    /// to `true`.
    pub event_store: Option<Arc<dyn EventStore>>,
}

impl RunOptions {
    /// Start from a primary stream factory; every other field takes its
    /// documented default.
    #[must_use]
    pub fn new(stream_factory: Arc<dyn StreamFactory>) -> Self {
        Self {
            stream_factory,
            fallback_stream_factories: Vec::new(),
            guardrails: Vec::new(),
            retry: RetryConfig::default(),
            retry_hooks: None,
            timeout: None,
            initial_token_timeout: relay_core::constants::DEFAULT_INITIAL_TOKEN_TIMEOUT,
            inter_token_timeout: relay_core::constants::DEFAULT_INTER_TOKEN_TIMEOUT,
            signal: None,
            monitoring: Vec::new(),
            detect_drift: false,
            detect_zero_tokens: true,
            check_intervals: None,
            on_event: None,
            legacy_callbacks: None,
            continue_from_last_known_good_token: false,
            build_continuation_prompt: None,
            deduplicate_continuation: true,
            deduplication_options: OverlapOptions::default(),
            adapter: None,
            adapter_registry: Arc::new(AdapterRegistry::new()),
            interceptors: InterceptorChain::new(Vec::new()),
            meta: None,
            record: None,
            event_store: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, factory: Arc<dyn StreamFactory>) -> Self {
        self.fallback_stream_factories.push(factory);
        self
    }

    #[must_use]
    pub fn with_guardrails(mut self, rules: Vec<GuardrailRule>) -> Self {
        self.guardrails = rules;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_retry_hooks(mut self, hooks: Arc<dyn RetryHooks>) -> Self {
        self.retry_hooks = Some(hooks);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn with_monitoring(mut self, sink: Arc<dyn relay_events::Sink>) -> Self {
        self.monitoring.push(sink);
        self
    }

    #[must_use]
    pub fn with_detect_drift(mut self, detect: bool) -> Self {
        self.detect_drift = detect;
        self
    }

    #[must_use]
    pub fn with_check_intervals(mut self, intervals: IntervalSettings) -> Self {
        self.check_intervals = Some(intervals);
        self
    }

    #[must_use]
    pub fn with_legacy_callbacks(mut self, callbacks: LegacyCallbacks) -> Self {
        self.legacy_callbacks = Some(Arc::new(callbacks));
        self
    }

    #[must_use]
    pub fn with_continuation(mut self, build_prompt: Option<Arc<dyn Fn(&str) + Send + Sync>>) -> Self {
        self.continue_from_last_known_good_token = true;
        self.build_continuation_prompt = build_prompt;
        self
    }

    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn StreamAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn with_adapter_registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.adapter_registry = registry;
        self
    }

    #[must_use]
    pub fn with_interceptors(mut self, interceptors: InterceptorChain<InterceptorOptions, RunSummary>) -> Self {
        self.interceptors = interceptors;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    #[must_use]
    pub fn with_recording(mut self, record: bool, store: Arc<dyn EventStore>) -> Self {
        self.record = Some(record);
        self.event_store = Some(store);
        self
    }
}
