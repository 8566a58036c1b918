//! End-to-end driver tests: each scenario wires a scripted stream factory
//! straight into `run()` and asserts on the caller-visible event sequence,
//! the terminal outcome, and the session snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;

use relay_core::event::Event;
use relay_core::guardrail::{violation, GuardrailRule, RuleCheckContext, Severity};
use relay_core::retry::{ErrorCategory, RetryConfig};
use relay_checkpoint::OverlapOptions;
use relay_events::{ObservabilityEnvelope, ObservabilityEvent, Sink};
use relay_retry::categorizer::ErrorHint;
use relay_runtime::{run, ChunkResult, ChunkStream, RunOptions, StreamError, StreamFactory};
use relay_settings::IntervalSettings;

/// A stream factory driven by a fixed script per call. The `n`th call to
/// `start` plays back `scripts[n]`; calls past the end replay the last
/// script, which is enough for every scenario here (none calls a factory
/// more than its script list covers).
struct ScriptedFactory {
    scripts: Vec<Vec<ChunkResult>>,
    calls: AtomicUsize,
}

impl ScriptedFactory {
    fn new(scripts: Vec<Vec<ChunkResult>>) -> Self {
        Self { scripts, calls: AtomicUsize::new(0) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StreamFactory for ScriptedFactory {
    fn start(&self, _resume_checkpoint: Option<&str>) -> ChunkStream {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(index).or_else(|| self.scripts.last()).cloned().unwrap_or_default();
        Box::pin(futures::stream::iter(script))
    }
}

/// A stream that never yields, for the initial-token-timeout scenario.
struct NeverFactory;

impl StreamFactory for NeverFactory {
    fn start(&self, _resume_checkpoint: Option<&str>) -> ChunkStream {
        Box::pin(futures::stream::pending())
    }
}

fn tok(s: &str) -> ChunkResult {
    Ok(relay_adapters::RawChunk::Text(s.to_owned()))
}

fn err_category(message: &str, category: ErrorCategory) -> ChunkResult {
    Err(StreamError::new(message).with_hint(ErrorHint::Category(category)))
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<ObservabilityEvent>>,
}

impl Sink for RecordingSink {
    fn on_event(&self, envelope: &ObservabilityEnvelope) {
        self.seen.lock().unwrap().push(envelope.event.clone());
    }
}

fn token_values(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Token { value, .. } => Some(value.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn happy_path_emits_tokens_then_completes() {
    let factory = Arc::new(ScriptedFactory::new(vec![vec![tok("Hello, "), tok("world"), tok("!")]]));
    let opts = RunOptions::new(factory);

    let mut handle = run(opts);
    let events: Vec<Event> = handle.events().collect().await;
    let outcome = handle.finish().await;

    assert_eq!(token_values(&events), vec!["Hello, ", "world", "!"]);
    assert!(matches!(events.last(), Some(Event::Complete { .. })));

    let summary = outcome.expect("run should succeed");
    assert_eq!(summary.content, "Hello, world!");
    assert_eq!(summary.token_count, 3);
    assert!(summary.completed);
}

#[tokio::test]
async fn guardrail_retry_then_success() {
    let factory = Arc::new(ScriptedFactory::new(vec![
        vec![tok("forbidden")],
        vec![tok("clean content")],
    ]));

    let rule = GuardrailRule::new(
        "no-forbidden",
        "flags the word forbidden as a recoverable violation",
        Severity::Error,
        true,
        true,
        |ctx: &RuleCheckContext<'_>| {
            if ctx.delta.is_some_and(|d| d.contains("forbidden")) {
                vec![violation("content contains a forbidden word")]
            } else {
                Vec::new()
            }
        },
    );

    let violation_sink = Arc::new(RecordingSink::default());

    let mut opts = RunOptions::new(factory.clone())
        .with_guardrails(vec![rule])
        .with_monitoring(violation_sink.clone());
    opts.check_intervals = Some(IntervalSettings { guardrail_tokens: 1, drift_tokens: 1000, checkpoint_tokens: 1000 });
    opts.retry.base_delay_ms = 1;
    opts.retry.max_delay_ms = 5;

    let mut handle = run(opts);
    let events: Vec<Event> = handle.events().collect().await;
    let outcome = handle.finish().await;

    let summary = outcome.expect("run should recover and succeed");
    assert_eq!(summary.content, "clean content");
    assert!(summary.completed);

    let seen = violation_sink.seen.lock().unwrap();
    let violation_count = seen.iter().filter(|e| matches!(e, ObservabilityEvent::GuardrailViolation { .. })).count();
    assert_eq!(violation_count, 1);
    let retry_count = seen.iter().filter(|e| matches!(e, ObservabilityEvent::RetryAttempt { .. })).count();
    assert_eq!(retry_count, 1);
    drop(seen);

    assert_eq!(token_values(&events), vec!["clean content"]);
}

#[tokio::test]
async fn fallback_with_resume_and_dedup() {
    let primary = Arc::new(ScriptedFactory::new(vec![vec![
        tok("t0-"),
        tok("t1-"),
        tok("t2-"),
        tok("t3-"),
        tok("t4-"),
        err_category("upstream dropped the connection", ErrorCategory::Network),
    ]]));
    let fallback = Arc::new(ScriptedFactory::new(vec![vec![tok("t3-t4-"), tok("cont")]]));

    let sink = Arc::new(RecordingSink::default());

    let mut opts = RunOptions::new(primary)
        .with_fallback(fallback.clone())
        .with_continuation(None)
        .with_monitoring(sink.clone());
    opts.retry = RetryConfig { max_retries: Some(0), ..RetryConfig::default() };
    opts.deduplicate_continuation = true;
    opts.deduplication_options = OverlapOptions { min_overlap: 2, ..OverlapOptions::default() };
    opts.check_intervals = Some(IntervalSettings { guardrail_tokens: 1000, drift_tokens: 1000, checkpoint_tokens: 5 });

    let mut handle = run(opts);
    let events: Vec<Event> = handle.events().collect().await;
    let snapshot = handle.snapshot();
    let outcome = handle.finish().await;

    let summary = outcome.expect("fallback should recover and complete");
    assert_eq!(summary.content, "t0-t1-t2-t3-t4-cont");
    assert_eq!(token_values(&events).concat(), "t0-t1-t2-t3-t4-cont");
    assert_eq!(snapshot.fallback_index, 1);

    let seen = sink.seen.lock().unwrap();
    let fallback_at = seen.iter().position(|e| matches!(e, ObservabilityEvent::FallbackStart { .. }));
    let resume_at = seen.iter().position(|e| matches!(e, ObservabilityEvent::ResumeStart { .. }));
    let (fallback_at, resume_at) = (fallback_at.expect("fallback start recorded"), resume_at.expect("resume start recorded"));
    assert!(fallback_at < resume_at, "FALLBACK_START must precede RESUME_START");
}

#[tokio::test]
async fn network_retry_does_not_count_toward_model_attempts() {
    let factory = Arc::new(ScriptedFactory::new(vec![
        vec![tok("a"), tok("b"), tok("c"), err_category("ECONNRESET", ErrorCategory::Network)],
        vec![tok("d"), tok("e"), tok("f"), err_category("ECONNRESET", ErrorCategory::Network)],
        vec![tok("done")],
    ]));

    let mut opts = RunOptions::new(factory.clone());
    opts.retry = RetryConfig { attempts: 2, ..RetryConfig::default() };
    opts.retry.base_delay_ms = 1;
    opts.retry.max_delay_ms = 5;

    let mut handle = run(opts);
    while handle.events().next().await.is_some() {}
    let snapshot = handle.snapshot();
    let outcome = handle.finish().await;

    let summary = outcome.expect("should eventually succeed on the third attempt");
    assert!(summary.completed);
    assert_eq!(snapshot.network_retries, 2);
    assert_eq!(snapshot.model_retries, 0);
    assert_eq!(factory.call_count(), 3);
}

#[tokio::test]
async fn absolute_cap_enforces_global_stop() {
    let factory = Arc::new(ScriptedFactory::new(vec![
        vec![err_category("connection reset by peer", ErrorCategory::Network)],
        vec![err_category("the model produced an incomplete response", ErrorCategory::Model)],
        vec![err_category("connection reset by peer", ErrorCategory::Network)],
        vec![err_category("the model produced an incomplete response", ErrorCategory::Model)],
    ]));

    let mut opts = RunOptions::new(factory.clone());
    opts.retry = RetryConfig { attempts: 100, max_retries: Some(3), ..RetryConfig::default() };
    opts.retry.base_delay_ms = 1;
    opts.retry.max_delay_ms = 5;

    let mut handle = run(opts);
    while handle.events().next().await.is_some() {}
    let snapshot = handle.snapshot();
    let outcome = handle.finish().await;

    let err = outcome.expect_err("the absolute cap must stop the run");
    assert_eq!(err.code, relay_core::error::ErrorCode::AllStreamsExhausted);
    assert_eq!(snapshot.total_retries(), 3);
    assert_eq!(factory.call_count(), 4);
}

#[tokio::test]
async fn initial_token_timeout_is_transient_and_retryable() {
    let factory = Arc::new(NeverFactory);
    let mut opts = RunOptions::new(factory);
    opts.initial_token_timeout = Duration::from_millis(50);
    opts.retry = RetryConfig { max_retries: Some(0), ..RetryConfig::default() };

    let started = tokio::time::Instant::now();
    let mut handle = run(opts);
    while handle.events().next().await.is_some() {}
    let outcome = handle.finish().await;
    let elapsed = started.elapsed();

    let err = outcome.expect_err("no chunk ever arrives");
    assert_eq!(err.code, relay_core::error::ErrorCode::InitialTokenTimeout);
    assert_eq!(err.category, ErrorCategory::Transient);
    assert!(err.is_retryable());
    assert!(!err.has_checkpoint());
    assert!(elapsed >= Duration::from_millis(50));
}
