//! Deterministic replayer and the `compareReplays` equality utility. A pure
//! function over a stored stream: no network, no timeouts, no retries, no
//! live guardrail/drift evaluation. It only re-applies what was already
//! decided once, live, and recorded.

use std::time::Duration;

use relay_core::event::Event;
use relay_core::guardrail::Violation;
use relay_core::ids::StreamId;
use relay_core::recorded::{Envelope, RecordedEvent};
use relay_core::session::{SessionSnapshot, SessionState};

use crate::store::{EventStore, StoreError};

/// A fixed stand-in for the wall-clock gap between consecutive replayed
/// events. The minimal envelope model carries no per-event timestamp to
/// scale, so `speed` can only distinguish "instant" (`speed <= 0.0`) from
/// "paced" (`speed > 0.0`, sleeping `DEFAULT_GAP_MS / speed` between events)
/// rather than reproducing the original gaps exactly.
const DEFAULT_GAP_MS: u64 = 50;

/// Slicing and pacing options for one replay.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayOptions {
    /// Only replay envelopes with `seq >= from_seq`. `None` means from the start.
    pub from_seq: Option<u64>,
    /// Only replay envelopes with `seq <= to_seq`. `None` means to the end.
    pub to_seq: Option<u64>,
    /// `0.0` replays instantly. Any other positive value paces emission, see
    /// [`DEFAULT_GAP_MS`]'s caveat.
    pub speed: f64,
}

/// The result of replaying one stream: every caller-visible event the
/// original run would have emitted, plus the session state reconstructed by
/// folding the recorded log.
#[derive(Clone, Debug)]
pub struct ReplayOutcome {
    /// Events re-emitted in recorded order.
    pub events: Vec<Event>,
    /// Session state as of the last replayed envelope.
    pub session: SessionSnapshot,
}

/// Replays a stream from `store`, applying `options`' slicing and pacing, and
/// firing `monitor` (if given) once per replayed envelope — the "monitoring
/// callbacks" describes.
pub struct Replayer<'a> {
    store: &'a dyn EventStore,
}

impl<'a> Replayer<'a> {
    /// Replay against `store`.
    #[must_use]
    pub fn new(store: &'a dyn EventStore) -> Self {
        Self { store }
    }

    /// Replay `stream_id`, calling `monitor` once per envelope in recorded
    /// order before it's folded into the returned outcome.
    ///
    /// # Errors
    ///
    /// Propagates the underlying store's read errors.
    pub async fn replay(
        &self,
        stream_id: &StreamId,
        options: ReplayOptions,
        mut monitor: Option<&mut dyn FnMut(&Envelope)>,
    ) -> Result<ReplayOutcome, StoreError> {
        let all = self.store.get_events(stream_id).await?;
        let slice: Vec<&Envelope> = all
            .iter()
            .filter(|e| options.from_seq.is_none_or(|from| e.seq >= from))
            .filter(|e| options.to_seq.is_none_or(|to| e.seq <= to))
            .collect();

        let mut session = SessionSnapshot::new(stream_id.clone());
        let mut events = Vec::with_capacity(slice.len());

        for envelope in slice {
            if let Some(cb) = monitor.as_deref_mut() {
                cb(envelope);
            }
            if options.speed > 0.0 {
                let delay_ms = (DEFAULT_GAP_MS as f64 / options.speed).round() as u64;
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
            apply(&mut session, &envelope.event, &mut events);
        }

        Ok(ReplayOutcome { events, session })
    }
}

fn apply(session: &mut SessionSnapshot, event: &RecordedEvent, out: &mut Vec<Event>) {
    match event {
        RecordedEvent::Start { .. } => {
            session.state = SessionState::WaitingFirstToken;
        }
        RecordedEvent::Token { value, .. } => {
            session.content.push_str(value);
            session.token_count += 1;
            session.state = SessionState::Streaming;
            out.push(Event::Token { value: value.clone(), ts: session.clock_ms });
        }
        RecordedEvent::Checkpoint { content, .. } => {
            session.checkpoint.clone_from(content);
        }
        RecordedEvent::Guardrail { result, .. } => {
            if let Some(violations) = result
                .get("violations")
                .and_then(|v| serde_json::from_value::<Vec<Violation>>(v.clone()).ok())
            {
                session.violations.extend(violations);
            }
        }
        RecordedEvent::Drift { result, .. } => {
            if result.get("detected").and_then(serde_json::Value::as_bool).unwrap_or(false) {
                session.drift_detected = true;
            }
        }
        RecordedEvent::Retry { counts_toward_limit, .. } => {
            // Only `model_retry_count` is part of the determinism invariant;
            // network/transient splitting beyond "did it count toward the model budget"
            // isn't recoverable from the recorded reason alone, so everything else folds
            // into `network_retries`.
            if *counts_toward_limit {
                session.model_retries += 1;
            } else {
                session.network_retries += 1;
            }
        }
        RecordedEvent::Fallback { to } => {
            session.fallback_index = *to;
            session.state = SessionState::Fallback;
        }
        RecordedEvent::Continuation { checkpoint, .. } => {
            session.resumed = true;
            session.checkpoint.clone_from(checkpoint);
            session.state = SessionState::ContinuationMatching;
        }
        RecordedEvent::Complete { content, token_count } => {
            session.content.clone_from(content);
            session.token_count = *token_count;
            session.completed = true;
            session.state = SessionState::Complete;
            out.push(Event::Complete { ts: session.clock_ms });
        }
        RecordedEvent::Error { error, .. } => {
            session.completed = true;
            session.state = SessionState::Error;
            let cause = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("replayed error")
                .to_owned();
            let category = error
                .get("category")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("INTERNAL")
                .to_owned();
            out.push(Event::Error { cause, category, ts: session.clock_ms });
        }
    }
}

/// Which field first diverged between two replays of the same stream,
/// restricted to the determinism invariant's field set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayComparison {
    /// `true` iff every compared field matched.
    pub identical: bool,
    /// Name of the first field that differed, if any.
    pub first_divergent_field: Option<&'static str>,
}

/// Compare two replay outcomes field-by-field over the determinism
/// invariant's subset, short-circuiting at the first mismatch.
#[must_use]
pub fn compare_replays(a: &ReplayOutcome, b: &ReplayOutcome) -> ReplayComparison {
    let (sa, sb) = (&a.session, &b.session);
    let checks: [(&'static str, bool); 6] = [
        ("content", sa.content == sb.content),
        ("token_count", sa.token_count == sb.token_count),
        ("completed", sa.completed == sb.completed),
        ("model_retries", sa.model_retries == sb.model_retries),
        ("fallback_index", sa.fallback_index == sb.fallback_index),
        ("drift_detected", sa.drift_detected == sb.drift_detected),
    ];
    for (field, matches) in checks {
        if !matches {
            return ReplayComparison { identical: false, first_divergent_field: Some(field) };
        }
    }
    if sa.violations.len() != sb.violations.len() {
        return ReplayComparison { identical: false, first_divergent_field: Some("violations.length") };
    }
    ReplayComparison { identical: true, first_divergent_field: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn sid(s: &str) -> StreamId {
        StreamId::new(s).unwrap()
    }

    async fn seed(store: &MemoryStore, id: &StreamId) {
        let _ = store.append(id, RecordedEvent::Start { serialized_options: serde_json::json!({}) }).await.unwrap();
        let _ = store.append(id, RecordedEvent::Token { value: "hel".into(), index: 0 }).await.unwrap();
        let _ = store.append(id, RecordedEvent::Token { value: "lo".into(), index: 1 }).await.unwrap();
        let _ = store.append(id, RecordedEvent::Complete { content: "hello".into(), token_count: 2 }).await.unwrap();
    }

    #[tokio::test]
    async fn replay_reconstructs_content_and_terminal_state() {
        let store = MemoryStore::new();
        let id = sid("s1");
        seed(&store, &id).await;

        let outcome = Replayer::new(&store).replay(&id, ReplayOptions::default(), None).await.unwrap();
        assert_eq!(outcome.session.content, "hello");
        assert_eq!(outcome.session.token_count, 2);
        assert!(outcome.session.completed);
        assert_eq!(outcome.session.state, SessionState::Complete);
    }

    #[tokio::test]
    async fn two_replays_of_the_same_stream_are_identical() {
        let store = MemoryStore::new();
        let id = sid("s1");
        seed(&store, &id).await;

        let a = Replayer::new(&store).replay(&id, ReplayOptions::default(), None).await.unwrap();
        let b = Replayer::new(&store).replay(&id, ReplayOptions::default(), None).await.unwrap();
        assert_eq!(compare_replays(&a, &b), ReplayComparison { identical: true, first_divergent_field: None });
    }

    #[tokio::test]
    async fn diverging_content_is_reported() {
        let store = MemoryStore::new();
        let id = sid("s1");
        seed(&store, &id).await;
        let a = Replayer::new(&store).replay(&id, ReplayOptions::default(), None).await.unwrap();

        let mut b = a.clone();
        b.session.content.push('!');
        let cmp = compare_replays(&a, &b);
        assert!(!cmp.identical);
        assert_eq!(cmp.first_divergent_field, Some("content"));
    }

    #[tokio::test]
    async fn from_seq_and_to_seq_slice_the_replay() {
        let store = MemoryStore::new();
        let id = sid("s1");
        seed(&store, &id).await;

        let opts = ReplayOptions { from_seq: Some(1), to_seq: Some(2), speed: 0.0 };
        let outcome = Replayer::new(&store).replay(&id, opts, None).await.unwrap();
        assert_eq!(outcome.session.content, "hello");
        assert!(!outcome.session.completed);
    }

    #[tokio::test]
    async fn monitor_callback_fires_once_per_envelope() {
        let store = MemoryStore::new();
        let id = sid("s1");
        seed(&store, &id).await;

        let mut count = 0usize;
        let mut cb = |_: &Envelope| count += 1;
        let _ = Replayer::new(&store).replay(&id, ReplayOptions::default(), Some(&mut cb)).await.unwrap();
        assert_eq!(count, 4);
    }
}
