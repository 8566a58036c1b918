//! The session driver: the fallback loop, the per-fallback attempt loop, and
//! the retry decision that connects them.

pub mod attempt;
pub mod finalize;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use relay_adapters::InterceptorChain;
use relay_checkpoint::ResumeBuffer;
use relay_core::error::ErrorCode;
use relay_core::event::Event;
use relay_core::ids::StreamId;
use relay_core::recorded::RecordedEvent;
use relay_core::retry::ErrorCategory;
use relay_core::session::{SessionSnapshot, SessionState};
use relay_core::RelayError;
use relay_events::{Dispatcher, ObservabilityEvent};
use relay_guardrails::GuardrailEngine;
use relay_retry::manager::{DecideContext, RetryManager};

use crate::clock::SessionClock;
use crate::options::{InterceptorOptions, RunOptions};
use crate::result::{EventSink, RunHandle, RunOutcome, RunSummary};

use attempt::{run_attempt, AttemptConfig, AttemptOutcome};
use finalize::{finalize, FinalizeOutcome};

/// Start a run. Returns immediately with a handle; the session itself runs on
/// a spawned task.
#[must_use]
pub fn run(options: RunOptions) -> RunHandle {
    let stream_id = StreamId::generate();
    let root_signal = options.signal.clone().unwrap_or_else(CancellationToken::new);
    let cancel = root_signal.child_token();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let snapshot = Arc::new(RwLock::new(SessionSnapshot::new(stream_id.clone())));
    let error_summary = Arc::new(RwLock::new(HashMap::new()));

    let mut dispatcher = Dispatcher::new(stream_id.clone(), options.meta.clone());
    for sink in &options.monitoring {
        dispatcher.register(Arc::clone(sink));
    }
    if let Some(legacy) = options.legacy_callbacks.clone() {
        dispatcher.register(legacy as Arc<dyn relay_events::Sink>);
    }
    let dispatcher = Arc::new(dispatcher);

    let on_event = options.on_event.clone();
    let events_tx = EventSink::new(events_tx, on_event);

    let span = relay_logging::session_span(&stream_id.to_string());
    let join = tokio::spawn(
        drive(
            options,
            stream_id,
            Arc::clone(&snapshot),
            Arc::clone(&error_summary),
            cancel.clone(),
            Arc::clone(&dispatcher),
            events_tx,
        )
        .instrument(span),
    );

    RunHandle::new(events_rx, snapshot, error_summary, cancel, dispatcher, join)
}

/// Drains the overall session timeout, if any, by cancelling `cancel` once it
/// elapses.
async fn watch_timeout(timeout: Option<Duration>, cancel: CancellationToken) {
    if let Some(timeout) = timeout {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(timeout) => cancel.cancel(),
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn drive(
    options: RunOptions,
    stream_id: StreamId,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    error_summary: Arc<RwLock<HashMap<ErrorCategory, usize>>>,
    cancel: CancellationToken,
    dispatcher: Arc<Dispatcher>,
    events_tx: EventSink,
) -> RunOutcome {
    let clock = SessionClock::start();
    let clock_ms = || clock.now_ms();

    let ambient = relay_settings::load().unwrap_or_default();
    let timeout = options.timeout.or(Some(Duration::from_millis(ambient.default_timeout_ms)));
    tokio::spawn(watch_timeout(timeout, cancel.clone()));

    let interceptor_options =
        InterceptorOptions { meta: options.meta.clone(), adapter_options: None };
    if let Err(message) = options.interceptors.run_before(interceptor_options).await {
        let err = RelayError::new(ErrorCode::InvalidStream, message, clock_ms());
        return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
    }

    let intervals = options.check_intervals.unwrap_or(ambient.intervals);
    let record = options.record.unwrap_or(ambient.recording_enabled);
    let store = if record { options.event_store.as_deref() } else { None };

    if let Some(store) = store {
        let serialized_options = serde_json::json!({
            "fallback_count": options.fallback_stream_factories.len(),
            "attempts": options.retry.attempts,
            "detect_drift": options.detect_drift,
        });
        if let Err(err) = store.append(&stream_id, RecordedEvent::Start { serialized_options }).await {
            tracing::warn!(%stream_id, error = %err, "failed to record session start (fail-open)");
        }
    }

    let _ = dispatcher.emit(ObservabilityEvent::SessionStart, clock_ms());

    let retry_hooks = options.retry_hooks.clone();

    let mut guardrails = GuardrailEngine::new();
    for rule in options.guardrails {
        guardrails.register(rule);
    }

    let mut retry_manager = RetryManager::new(options.retry.clone());
    let mut factories = Vec::with_capacity(1 + options.fallback_stream_factories.len());
    factories.push(options.stream_factory);
    factories.extend(options.fallback_stream_factories);

    let mut tool_calls = crate::tool_calls::ToolCallTracker::new();
    let mut attempt_number: u32 = 0;
    let mut prev_delay_ms: Option<u64> = None;

    'fallback: for fallback_index in 0..factories.len() {
        {
            let mut s = snapshot.write();
            s.fallback_index = fallback_index as u32;
        }
        if fallback_index > 0 {
            let _ = dispatcher.emit(
                ObservabilityEvent::FallbackStart { fallback_index: fallback_index as u32 },
                clock_ms(),
            );
            if let Some(store) = store {
                if let Err(err) =
                    store.append(&stream_id, RecordedEvent::Fallback { to: fallback_index as u32 }).await
                {
                    tracing::warn!(%stream_id, error = %err, "failed to record fallback advance (fail-open)");
                }
            }
        }

        loop {
            if cancel.is_cancelled() {
                break 'fallback;
            }

            attempt_number += 1;
            let resume_checkpoint = {
                let s = snapshot.read();
                (options.continue_from_last_known_good_token && !s.checkpoint.is_empty())
                    .then(|| s.checkpoint.clone())
            };

            let mut resuming_now = false;
            let mut resume_buffer = if let Some(checkpoint) = resume_checkpoint.as_deref() {
                snapshot.write().state = SessionState::CheckpointVerifying;
                let valid = snapshot.read().checkpoint_is_valid_prefix();
                if !valid {
                    tracing::warn!(%stream_id, "checkpoint failed prefix validation, discarding");
                    None
                } else {
                    let _ = dispatcher.emit(
                        ObservabilityEvent::ResumeStart { checkpoint_len: checkpoint.len() },
                        clock_ms(),
                    );
                    if let Some(build_prompt) = &options.build_continuation_prompt {
                        build_prompt(checkpoint);
                    }
                    if let Some(store) = store {
                        let at = snapshot.read().token_count;
                        if let Err(err) = store
                            .append(&stream_id, RecordedEvent::Continuation { checkpoint: checkpoint.to_owned(), at })
                            .await
                        {
                            tracing::warn!(%stream_id, error = %err, "failed to record continuation (fail-open)");
                        }
                    }
                    snapshot.write().resumed = true;
                    resuming_now = true;
                    if options.deduplicate_continuation {
                        Some(ResumeBuffer::new(checkpoint.to_owned(), options.deduplication_options))
                    } else {
                        None
                    }
                }
            } else {
                None
            };

            // Per-attempt fields start fresh on every new attempt; only a
            // validated resume seeds `content` from the prior checkpoint rather
            // than an empty string.
            {
                let mut s = snapshot.write();
                if resuming_now {
                    s.content = resume_checkpoint.clone().unwrap_or_default();
                } else {
                    s.content.clear();
                    s.token_count = 0;
                }
            }

            let _ = dispatcher.emit(
                ObservabilityEvent::AttemptStart { attempt: attempt_number, fallback_index: fallback_index as u32 },
                clock_ms(),
            );

            let stream = factories[fallback_index].start(resume_checkpoint.as_deref());

            let outcome = {
                let mut s = snapshot.write();
                let config = AttemptConfig {
                    guardrails: &guardrails,
                    detect_drift: options.detect_drift,
                    adapter_registry: &options.adapter_registry,
                    explicit_adapter: options.adapter.as_ref(),
                    intervals,
                    initial_token_timeout: options.initial_token_timeout,
                    inter_token_timeout: options.inter_token_timeout,
                    cancel: &cancel,
                    store,
                    stream_id: &stream_id,
                };
                run_attempt(
                    stream,
                    &mut s,
                    &dispatcher,
                    &clock_ms,
                    &events_tx,
                    &mut tool_calls,
                    resume_buffer.as_mut(),
                    &config,
                )
                .await
            };

            match outcome {
                AttemptOutcome::Completed => {
                    snapshot.write().state = SessionState::Finalizing;
                    let finalize_outcome = {
                        let mut s = snapshot.write();
                        finalize(&mut s, &guardrails, options.detect_drift, options.detect_zero_tokens)
                    };
                    match finalize_outcome {
                        FinalizeOutcome::Success => {
                            let mut s = snapshot.write();
                            s.completed = true;
                            s.state = SessionState::Complete;
                            let summary = RunSummary {
                                content: s.content.clone(),
                                token_count: s.token_count,
                                completed: true,
                            };
                            drop(s);
                            if let Some(store) = store {
                                let s = snapshot.read();
                                if let Err(err) = store
                                    .append(
                                        &stream_id,
                                        RecordedEvent::Complete { content: s.content.clone(), token_count: s.token_count },
                                    )
                                    .await
                                {
                                    tracing::warn!(%stream_id, error = %err, "failed to record completion (fail-open)");
                                }
                            }
                            let _ = dispatcher.emit(ObservabilityEvent::Complete, clock_ms());
                            let _ = events_tx.send(Event::Complete { ts: clock_ms() });
                            let summary = options.interceptors.run_after(summary).await;
                            return Ok(summary);
                        }
                        FinalizeOutcome::Fatal { message } => {
                            let err = RelayError::new(ErrorCode::FatalGuardrailViolation, message, clock_ms())
                                .with_checkpoint(snapshot.read().content.clone())
                                .with_token_count(snapshot.read().token_count);
                            return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
                        }
                        FinalizeOutcome::Retry { reason, message } => {
                            save_checkpoint_from_content(&snapshot);
                            let decision = decide_retry(
                                &mut retry_manager,
                                retry_hooks.as_deref(),
                                &snapshot,
                                &error_summary,
                                Some(reason),
                                &message,
                                None,
                                None,
                                attempt_number,
                                clock_ms(),
                                prev_delay_ms,
                            );
                            if !decision.should_retry {
                                let err = terminal_error(ErrorCode::GuardrailViolation, &message, &snapshot, clock_ms());
                                return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
                            }
                            prev_delay_ms = Some(decision.delay_ms);
                            record_retry_bookkeeping(&snapshot, decision.counts_toward_limit);
                            record_and_emit_retry(
                                &dispatcher,
                                store,
                                &stream_id,
                                &clock_ms,
                                attempt_number + 1,
                                &message,
                                decision.delay_ms,
                                decision.counts_toward_limit,
                            )
                            .await;
                            tokio::select! {
                                () = cancel.cancelled() => break 'fallback,
                                () = tokio::time::sleep(Duration::from_millis(decision.delay_ms)) => {}
                            }
                        }
                    }
                }
                AttemptOutcome::Interrupted { partial } => {
                    let mut s = snapshot.write();
                    s.state = SessionState::Aborting;
                    if let Some(partial) = partial {
                        s.checkpoint = partial;
                    }
                    drop(s);
                    let _ = dispatcher.emit(ObservabilityEvent::AbortRequested, clock_ms());
                    let err = terminal_error(ErrorCode::StreamAborted, "run aborted", &snapshot, clock_ms());
                    let _ = dispatcher.emit(ObservabilityEvent::AbortCompleted, clock_ms());
                    return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
                }
                AttemptOutcome::TimedOut { kind } => {
                    let code = if kind == "initial_token" { ErrorCode::InitialTokenTimeout } else { ErrorCode::InterTokenTimeout };
                    let message = format!("{kind} timeout elapsed");
                    save_checkpoint_from_content(&snapshot);
                    let decision = decide_retry(
                        &mut retry_manager,
                        retry_hooks.as_deref(),
                        &snapshot,
                        &error_summary,
                        None,
                        &message,
                        None,
                        None,
                        attempt_number,
                        clock_ms(),
                        prev_delay_ms,
                    );
                    if !decision.should_retry {
                        let err = terminal_error(code, &message, &snapshot, clock_ms());
                        return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
                    }
                    prev_delay_ms = Some(decision.delay_ms);
                    record_retry_bookkeeping(&snapshot, decision.counts_toward_limit);
                    record_and_emit_retry(
                        &dispatcher,
                        store,
                        &stream_id,
                        &clock_ms,
                        attempt_number + 1,
                        &message,
                        decision.delay_ms,
                        decision.counts_toward_limit,
                    )
                    .await;
                    tokio::select! {
                        () = cancel.cancelled() => break 'fallback,
                        () = tokio::time::sleep(Duration::from_millis(decision.delay_ms)) => {}
                    }
                }
                AttemptOutcome::Failed(stream_error) => {
                    let decision = decide_retry(
                        &mut retry_manager,
                        retry_hooks.as_deref(),
                        &snapshot,
                        &error_summary,
                        None,
                        &stream_error.message,
                        stream_error.hint,
                        stream_error.error_type.as_deref(),
                        attempt_number,
                        clock_ms(),
                        prev_delay_ms,
                    );
                    if decision.category != ErrorCategory::Fatal {
                        save_checkpoint_from_content(&snapshot);
                    }
                    if !decision.should_retry {
                        if fallback_index + 1 < factories.len() {
                            continue 'fallback;
                        }
                        let err = terminal_error(ErrorCode::AllStreamsExhausted, &stream_error.message, &snapshot, clock_ms());
                        return Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await);
                    }
                    prev_delay_ms = Some(decision.delay_ms);
                    record_retry_bookkeeping(&snapshot, decision.counts_toward_limit);
                    record_and_emit_retry(
                        &dispatcher,
                        store,
                        &stream_id,
                        &clock_ms,
                        attempt_number + 1,
                        &stream_error.message,
                        decision.delay_ms,
                        decision.counts_toward_limit,
                    )
                    .await;
                    tokio::select! {
                        () = cancel.cancelled() => break 'fallback,
                        () = tokio::time::sleep(Duration::from_millis(decision.delay_ms)) => {}
                    }
                }
            }
        }
    }

    let message = "run aborted before completion";
    let err = terminal_error(ErrorCode::StreamAborted, message, &snapshot, clock_ms());
    Err(finish_with_error(&dispatcher, &events_tx, &options.interceptors, &clock_ms, err).await)
}

#[allow(clippy::too_many_arguments)]
fn decide_retry(
    retry_manager: &mut RetryManager,
    retry_hooks: Option<&dyn relay_retry::manager::RetryHooks>,
    snapshot: &Arc<RwLock<SessionSnapshot>>,
    error_summary: &Arc<RwLock<HashMap<ErrorCategory, usize>>>,
    reason: Option<relay_core::retry::RetryReason>,
    message: &str,
    hint: Option<relay_retry::categorizer::ErrorHint>,
    error_type: Option<&str>,
    attempt: u32,
    now_ms: u64,
    prev_delay_ms: Option<u64>,
) -> relay_retry::manager::RetryDecision {
    let s = snapshot.read();
    let ctx = DecideContext {
        reason,
        message,
        hint,
        error_type,
        attempt,
        model_retries: s.model_retries,
        network_retries: s.network_retries,
        transient_retries: s.transient_retries,
        now_ms,
        prev_delay_ms,
    };
    drop(s);
    let decision = retry_manager.decide(&ctx, retry_hooks);
    let mut summary = error_summary.write();
    *summary.entry(decision.category).or_insert(0) += 1;
    decision
}

/// Carries partial content into `checkpoint` before a recoverable failure is
/// handed to the retry manager, so a resuming attempt picks up where this one
/// left off.
fn save_checkpoint_from_content(snapshot: &Arc<RwLock<SessionSnapshot>>) {
    let mut s = snapshot.write();
    if !s.content.is_empty() {
        s.checkpoint.clone_from(&s.content);
    }
}

fn record_retry_bookkeeping(snapshot: &Arc<RwLock<SessionSnapshot>>, counts_toward_limit: bool) {
    let mut s = snapshot.write();
    if counts_toward_limit {
        s.model_retries += 1;
    } else {
        s.network_retries += 1;
    }
    s.state = SessionState::Retrying;
}

#[allow(clippy::too_many_arguments)]
async fn record_and_emit_retry(
    dispatcher: &Dispatcher,
    store: Option<&dyn relay_store::EventStore>,
    stream_id: &StreamId,
    clock_ms: &impl Fn() -> u64,
    next_attempt: u32,
    reason: &str,
    delay_ms: u64,
    counts_toward_limit: bool,
) {
    let _ = dispatcher.emit(
        ObservabilityEvent::RetryAttempt { attempt: next_attempt, reason: reason.to_owned(), delay_ms },
        clock_ms(),
    );
    if let Some(store) = store {
        let event = RecordedEvent::Retry { attempt: next_attempt, reason: reason.to_owned(), counts_toward_limit };
        if let Err(err) = store.append(stream_id, event).await {
            tracing::warn!(%stream_id, error = %err, "failed to record retry (fail-open)");
        }
    }
}

fn terminal_error(code: ErrorCode, message: &str, snapshot: &Arc<RwLock<SessionSnapshot>>, now_ms: u64) -> RelayError {
    let s = snapshot.read();
    RelayError::new(code, message, now_ms)
        .with_checkpoint(if s.checkpoint.is_empty() { s.content.clone() } else { s.checkpoint.clone() })
        .with_token_count(s.token_count)
        .with_retry_counts(s.model_retries, s.network_retries)
        .with_fallback_index(s.fallback_index)
}

async fn finish_with_error(
    dispatcher: &Dispatcher,
    events_tx: &EventSink,
    interceptors: &InterceptorChain<InterceptorOptions, RunSummary>,
    clock_ms: &impl Fn() -> u64,
    err: RelayError,
) -> RelayError {
    let ts = clock_ms();
    let recoverable = err.is_retryable();
    let _ = dispatcher.emit(
        ObservabilityEvent::Error { code: format!("{:?}", err.code), recoverable },
        ts,
    );
    events_tx.send(Event::from_relay_error(&err, ts));
    interceptors.run_error(&err.message).await;
    err
}
