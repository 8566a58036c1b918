//! Session state and its invariants.

use serde::{Deserialize, Serialize};

use crate::guardrail::Violation;
use crate::ids::StreamId;

/// The driver's coarse-grained state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Collaborators constructed, nothing started yet.
    Init,
    /// Waiting for the first chunk of the current attempt.
    WaitingFirstToken,
    /// Actively consuming chunks.
    Streaming,
    /// Validating a checkpoint before resuming.
    CheckpointVerifying,
    /// Searching for the overlap between checkpoint and continuation.
    ContinuationMatching,
    /// Final guardrail/drift pass before terminal success.
    Finalizing,
    /// Between attempts, waiting on backoff.
    Retrying,
    /// Switching to the next stream factory.
    Fallback,
    /// Honoring `abort()`, releasing resources.
    Aborting,
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Error,
}

/// One live session. Owned exclusively by the driver for the session's
/// lifetime; every other collaborator borrows it. The token buffer itself
/// lives in the driver (append-only, never repeatedly concatenated); this
/// struct holds the materialized view used for guardrail/drift/checkpoint
/// evaluation plus the session-level bookkeeping invariants (monotone token
/// count, checkpoint-is-a-prefix, bounded retry counters).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Stable identifier for this session / stream.
    pub stream_id: StreamId,
    /// Current coarse state.
    pub state: SessionState,
    /// Ordered concatenation of emitted token deltas (post-dedup).
    pub content: String,
    /// Monotone non-decreasing count of emitted tokens.
    pub token_count: u64,
    /// Last known-good content snapshot, or empty.
    pub checkpoint: String,
    /// All violations recorded so far, across attempts.
    pub violations: Vec<Violation>,
    /// Whether the drift detector has flagged this session.
    pub drift_detected: bool,
    /// Retries that counted toward `attempts_limit`.
    pub model_retries: u32,
    /// Retries that never count toward the budget.
    pub network_retries: u32,
    /// Retries of any other category counted toward `max_retries_absolute`.
    pub transient_retries: u32,
    /// Current index into `stream_factories`. Never decreases.
    pub fallback_index: u32,
    /// Whether the current attempt is a resume from a checkpoint.
    pub resumed: bool,
    /// Whether the stream has reached a terminal state.
    pub completed: bool,
    /// Monotonically advancing session clock, milliseconds.
    pub clock_ms: u64,
}

impl SessionSnapshot {
    /// Construct a freshly initialized session.
    #[must_use]
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            state: SessionState::Init,
            content: String::new(),
            token_count: 0,
            checkpoint: String::new(),
            violations: Vec::new(),
            drift_detected: false,
            model_retries: 0,
            network_retries: 0,
            transient_retries: 0,
            fallback_index: 0,
            resumed: false,
            completed: false,
            clock_ms: 0,
        }
    }

    /// `content` is the ordered concatenation of emitted deltas — assert this
    /// invariant holds.
    #[must_use]
    pub fn content_matches_deltas(&self, deltas: &[&str]) -> bool {
        let expected: String = deltas.concat();
        expected == self.content
    }

    /// `checkpoint` must be a prefix of `content` at some earlier token boundary,
    /// or empty.
    #[must_use]
    pub fn checkpoint_is_valid_prefix(&self) -> bool {
        self.checkpoint.is_empty() || self.content.starts_with(&self.checkpoint)
    }

    /// Total retries so far across all categories (used against
    /// `max_retries_absolute`).
    #[must_use]
    pub fn total_retries(&self) -> u32 {
        self.model_retries + self.network_retries + self.transient_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> StreamId {
        StreamId::new("s1").unwrap()
    }

    #[test]
    fn fresh_session_invariants_hold() {
        let s = SessionSnapshot::new(sid());
        assert_eq!(s.state, SessionState::Init);
        assert!(s.checkpoint_is_valid_prefix());
        assert_eq!(s.total_retries(), 0);
    }

    #[test]
    fn checkpoint_prefix_check() {
        let mut s = SessionSnapshot::new(sid());
        s.content = "hello world".into();
        s.checkpoint = "hello".into();
        assert!(s.checkpoint_is_valid_prefix());
        s.checkpoint = "xyz".into();
        assert!(!s.checkpoint_is_valid_prefix());
    }

    #[test]
    fn content_matches_deltas_check() {
        let mut s = SessionSnapshot::new(sid());
        s.content = "ab".into();
        assert!(s.content_matches_deltas(&["a", "b"]));
        assert!(!s.content_matches_deltas(&["a", "c"]));
    }

    #[test]
    fn total_retries_sums_all_categories() {
        let mut s = SessionSnapshot::new(sid());
        s.model_retries = 1;
        s.network_retries = 2;
        s.transient_retries = 3;
        assert_eq!(s.total_retries(), 6);
    }
}
