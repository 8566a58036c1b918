//! One attempt's chunk-consumption loop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;

use relay_adapters::{resolve_adapter, AdapterRegistry, StreamAdapter};
use relay_checkpoint::{ResumeBuffer, ResumeOutcome};
use relay_core::event::Event;
use relay_core::ids::StreamId;
use relay_core::recorded::RecordedEvent;
use relay_core::retry::{ErrorCategory, RetryReason};
use relay_core::session::{SessionSnapshot, SessionState};
use relay_events::{Dispatcher, ObservabilityEvent};
use relay_guardrails::GuardrailEngine;
use relay_retry::categorizer::ErrorHint;
use relay_settings::IntervalSettings;
use relay_store::EventStore;

use crate::error::StreamError;
use crate::options::ChunkStream;
use crate::result::EventSink;
use crate::tool_calls::ToolCallTracker;

/// How one attempt ended.
pub enum AttemptOutcome {
    /// The chunk stream was exhausted cleanly.
    Completed,
    /// `abort()` fired (or the caller's signal did) mid-attempt.
    Interrupted {
        /// Content accumulated so far, if any, to use as the next checkpoint.
        partial: Option<String>,
    },
    /// The chunk stream, an adapter, or a mid-stream check failed.
    Failed(StreamError),
    /// No chunk arrived within the initial- or inter-token window.
    TimedOut {
        /// `"initial_token"` or `"inter_token"`.
        kind: &'static str,
    },
}

/// Everything the chunk loop needs that doesn't change within an attempt.
/// Borrowed rather than owned so the driver can reuse one instance across
/// every attempt of a fallback stream.
pub struct AttemptConfig<'a> {
    pub guardrails: &'a GuardrailEngine,
    pub detect_drift: bool,
    pub adapter_registry: &'a AdapterRegistry,
    pub explicit_adapter: Option<&'a Arc<dyn StreamAdapter>>,
    pub intervals: IntervalSettings,
    pub initial_token_timeout: Duration,
    pub inter_token_timeout: Duration,
    pub cancel: &'a CancellationToken,
    pub store: Option<&'a (dyn EventStore)>,
    pub stream_id: &'a StreamId,
}

async fn record(config: &AttemptConfig<'_>, event: RecordedEvent) {
    if let Some(store) = config.store {
        if let Err(err) = store.append(config.stream_id, event).await {
            tracing::warn!(stream_id = %config.stream_id, error = %err, "failed to record event (fail-open)");
        }
    }
}

/// Record, emit, and act on one non-deferred guardrail evaluation. Shared by
/// the fast-path tick and a slow-path tick's completion a cycle later.
async fn report_guardrail_evaluation(
    session: &mut SessionSnapshot,
    dispatcher: &Dispatcher,
    config: &AttemptConfig<'_>,
    ts: u64,
    evaluation: relay_guardrails::Evaluation,
) -> Option<AttemptOutcome> {
    if evaluation.violations.is_empty() {
        return None;
    }
    session.violations.extend(evaluation.violations.iter().cloned());
    for v in &evaluation.violations {
        let _ = dispatcher.emit(
            ObservabilityEvent::GuardrailViolation {
                rule_id: v.rule.clone(),
                severity: format!("{:?}", v.severity).to_lowercase(),
                recoverable: v.effective_recoverable(),
            },
            ts,
        );
    }
    record(config, RecordedEvent::Guardrail { at: session.token_count, result: serde_json::json!({"violations": evaluation.violations}) }).await;
    if evaluation.should_halt {
        let message = evaluation.violations.first().map_or_else(|| "fatal guardrail violation".to_owned(), |v| v.message.clone());
        return Some(AttemptOutcome::Failed(StreamError::new(message).with_hint(ErrorHint::Category(ErrorCategory::Fatal))));
    }
    if evaluation.should_retry {
        let message = evaluation.violations.first().map_or_else(|| "guardrail violation".to_owned(), |v| v.message.clone());
        return Some(AttemptOutcome::Failed(
            StreamError::new(message).with_hint(ErrorHint::Reason(RetryReason::GuardrailViolation)),
        ));
    }
    None
}

/// Run one attempt to completion, interruption, failure, or timeout.
/// `resume_buffer` is `Some` only while this attempt is resuming from a
/// checkpoint; once it resolves, later tokens pass straight through.
pub async fn run_attempt(
    mut stream: ChunkStream,
    session: &mut SessionSnapshot,
    dispatcher: &Dispatcher,
    clock_ms: impl Fn() -> u64,
    events_tx: &EventSink,
    tool_calls: &mut ToolCallTracker,
    mut resume_buffer: Option<&mut ResumeBuffer>,
    config: &AttemptConfig<'_>,
) -> AttemptOutcome {
    session.state = SessionState::WaitingFirstToken;
    let start_token_count = session.token_count;
    let mut deadline = TokioInstant::now() + config.initial_token_timeout;
    // Set when a guardrail tick took the slow path (content over the fast-path
    // threshold) and deferred its verdict; the *next* tick completes it via
    // `evaluate_full` before running its own check, per the engine's
    // fast-path/slow-path contract ("the next tick completes the check via
    // callback").
    let mut slow_check_pending = false;

    loop {
        tokio::select! {
            biased;
            () = config.cancel.cancelled() => {
                let partial = if session.content.is_empty() { None } else { Some(session.content.clone()) };
                return AttemptOutcome::Interrupted { partial };
            }
            () = tokio::time::sleep_until(deadline) => {
                let kind = if session.token_count == start_token_count { "initial_token" } else { "inter_token" };
                let _ = dispatcher.emit(ObservabilityEvent::TimeoutTriggered { kind: kind.to_owned() }, clock_ms());
                return AttemptOutcome::TimedOut { kind };
            }
            chunk = stream.next() => {
                match chunk {
                    None => {
                        if let Some(buf) = resume_buffer.as_deref_mut() {
                            if let Some(text) = buf.finalize_on_stream_end() {
                                if let Some(outcome) = absorb_token(session, dispatcher, &clock_ms, events_tx, config, &mut slow_check_pending, &text).await {
                                    return outcome;
                                }
                            }
                        }
                        return AttemptOutcome::Completed;
                    }
                    Some(Err(err)) => return AttemptOutcome::Failed(err),
                    Some(Ok(raw)) => {
                        let (adapter, _source) = match resolve_adapter(config.explicit_adapter, &raw, config.adapter_registry) {
                            Ok(pair) => pair,
                            Err(err) => return AttemptOutcome::Failed(
                                StreamError::new(err.to_string()).with_hint(ErrorHint::Category(ErrorCategory::Internal)),
                            ),
                        };
                        let event = match adapter.normalize(raw) {
                            Ok(event) => event,
                            Err(err) => return AttemptOutcome::Failed(
                                StreamError::new(err.to_string()).with_hint(ErrorHint::Category(ErrorCategory::Internal)),
                            ),
                        };

                        match event {
                            Event::Token { value, ts } => {
                                deadline = TokioInstant::now() + config.inter_token_timeout;
                                session.state = SessionState::Streaming;

                                let forwarded = match resume_buffer.as_deref_mut() {
                                    Some(buf) => match buf.push(&value) {
                                        ResumeOutcome::Buffering => None,
                                        ResumeOutcome::Resolved { emit } | ResumeOutcome::Flushed { emit } => Some(emit),
                                    },
                                    None => Some(value),
                                };
                                let Some(text) = forwarded else { continue };
                                let _ = ts;
                                if let Some(outcome) = absorb_token(session, dispatcher, &clock_ms, events_tx, config, &mut slow_check_pending, &text).await {
                                    return outcome;
                                }
                            }
                            Event::Message { value, role, ts } => {
                                for obs in tool_calls.observe(&value, ts) {
                                    let _ = dispatcher.emit(obs, clock_ms());
                                }
                                let _ = events_tx.send(Event::Message { value, role, ts });
                            }
                            Event::Data { payload, ts } => {
                                let _ = events_tx.send(Event::Data { payload, ts });
                            }
                            Event::Progress { fraction, ts } => {
                                let _ = events_tx.send(Event::Progress { fraction, ts });
                            }
                            Event::Error { cause, category, ts } => {
                                let _ = events_tx.send(Event::Error { cause, category, ts });
                            }
                            Event::Complete { .. } => return AttemptOutcome::Completed,
                        }
                    }
                }
            }
        }
    }
}

/// Append one deduplicated text fragment to the session, forward it, record
/// it, and run the streaming cadence checks. Returns `Some` with the outcome
/// the caller should return immediately if a cadence check ends the attempt.
async fn absorb_token(
    session: &mut SessionSnapshot,
    dispatcher: &Dispatcher,
    clock_ms: &impl Fn() -> u64,
    events_tx: &EventSink,
    config: &AttemptConfig<'_>,
    slow_check_pending: &mut bool,
    text: &str,
) -> Option<AttemptOutcome> {
    if text.is_empty() {
        return None;
    }

    let ts = clock_ms();
    session.content.push_str(text);
    session.token_count += 1;
    let _ = events_tx.send(Event::Token { value: text.to_owned(), ts });
    record(config, RecordedEvent::Token { value: text.to_owned(), index: session.token_count - 1 }).await;

    let guardrail_every = u64::from(config.intervals.guardrail_tokens.max(1));
    if session.token_count % guardrail_every == 0 {
        // A tick deferred last time completes now, against content as it
        // stands at this tick, before this tick's own check runs.
        if std::mem::take(slow_check_pending) {
            let completed_ctx = relay_core::guardrail::RuleCheckContext {
                content: &session.content,
                checkpoint: &session.checkpoint,
                delta: Some(text),
                token_count: session.token_count,
                completed: false,
            };
            let completed = config.guardrails.evaluate_full(&completed_ctx);
            if let Some(outcome) =
                report_guardrail_evaluation(session, dispatcher, config, ts, completed).await
            {
                return Some(outcome);
            }
        }

        let ctx = relay_core::guardrail::RuleCheckContext {
            content: &session.content,
            checkpoint: &session.checkpoint,
            delta: Some(text),
            token_count: session.token_count,
            completed: false,
        };
        let evaluation = config.guardrails.evaluate_tiered(&ctx);
        if evaluation.deferred {
            *slow_check_pending = true;
        } else if let Some(outcome) =
            report_guardrail_evaluation(session, dispatcher, config, ts, evaluation).await
        {
            return Some(outcome);
        }
    }

    if config.detect_drift {
        let drift_every = u64::from(config.intervals.drift_tokens.max(1));
        if session.token_count % drift_every == 0 {
            let drift = relay_drift::detect(&session.content, Some(text));
            if drift.detected {
                session.drift_detected = true;
                let types: Vec<String> = drift.types.iter().map(|t| format!("{t:?}")).collect();
                let _ = dispatcher.emit(ObservabilityEvent::DriftDetected { types, confidence: drift.confidence }, ts);
                record(config, RecordedEvent::Drift { at: session.token_count, result: serde_json::json!({"detected": true, "confidence": drift.confidence}) }).await;
                return Some(AttemptOutcome::Failed(
                    StreamError::new(format!("drift detected (confidence {:.2})", drift.confidence)).with_hint(ErrorHint::Reason(RetryReason::Drift)),
                ));
            }
        }
    }

    let checkpoint_every = u64::from(config.intervals.checkpoint_tokens.max(1));
    if session.token_count % checkpoint_every == 0 {
        session.checkpoint.clone_from(&session.content);
        let _ = dispatcher.emit(ObservabilityEvent::CheckpointSaved { at: session.token_count }, ts);
        record(config, RecordedEvent::Checkpoint { at: session.token_count, content: session.checkpoint.clone() }).await;
    }

    None
}
