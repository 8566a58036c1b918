//! Lightweight, derived health/capability snapshot.

use serde::{Deserialize, Serialize};

use crate::session::{SessionSnapshot, SessionState};

/// A point-in-time view of a session's health, cheap to compute and cheap to
/// poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Current coarse state.
    pub state: SessionState,
    /// Total attempts made so far (model + network + transient retries + 1).
    pub attempts: u32,
    /// Current fallback index.
    pub fallback_index: u32,
    /// Session clock at the time of the snapshot, milliseconds.
    pub elapsed_ms: u64,
    /// Whether any violation has been recorded.
    pub has_violations: bool,
    /// Whether drift has been flagged.
    pub drift_detected: bool,
}

impl HealthSnapshot {
    /// Derive a snapshot from live session state.
    #[must_use]
    pub fn from_session(session: &SessionSnapshot) -> Self {
        Self {
            state: session.state,
            attempts: session.total_retries() + 1,
            fallback_index: session.fallback_index,
            elapsed_ms: session.clock_ms,
            has_violations: !session.violations.is_empty(),
            drift_detected: session.drift_detected,
        }
    }

    /// Whether the session is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Complete | SessionState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::StreamId;

    #[test]
    fn derives_attempts_from_retry_counters() {
        let mut session = SessionSnapshot::new(StreamId::new("s1").unwrap());
        session.model_retries = 2;
        session.network_retries = 1;
        let snap = HealthSnapshot::from_session(&session);
        assert_eq!(snap.attempts, 4);
    }

    #[test]
    fn terminal_detection() {
        let mut session = SessionSnapshot::new(StreamId::new("s1").unwrap());
        session.state = SessionState::Complete;
        assert!(HealthSnapshot::from_session(&session).is_terminal());
        session.state = SessionState::Streaming;
        assert!(!HealthSnapshot::from_session(&session).is_terminal());
    }
}
