//! Runtime `Event` — the lazy, caller-visible stream.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, RelayError};

/// One item in the caller-visible, lazy, ordered event sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A content delta.
    Token {
        /// Fragment of text.
        value: String,
        /// Monotone timestamp, milliseconds since session start.
        ts: u64,
    },
    /// A role-tagged message (used for tool-call detection, ).
    Message {
        /// Message payload, typically JSON-serializable text.
        value: String,
        /// Message role (`"assistant"`, `"tool"`,...).
        role: String,
        /// Monotone timestamp.
        ts: u64,
    },
    /// Arbitrary structured payload passed through from the adapter.
    Data {
        /// Opaque JSON payload.
        payload: serde_json::Value,
        /// Monotone timestamp.
        ts: u64,
    },
    /// Fractional progress indicator, when the backend reports one.
    Progress {
        /// 0.0–1.0.
        fraction: f64,
        /// Monotone timestamp.
        ts: u64,
    },
    /// A recoverable error surfaced mid-stream (e.g. a retry was taken).
    Error {
        /// Human-readable cause.
        cause: String,
        /// Category string, mirrors `ErrorCategory`.
        category: String,
        /// Monotone timestamp.
        ts: u64,
    },
    /// Terminal success event. Exactly one of `Complete`/the caller's propagated
    /// error terminates a session.
    Complete {
        /// Monotone timestamp.
        ts: u64,
    },
}

impl Event {
    /// The timestamp carried by every variant.
    #[must_use]
    pub fn ts(&self) -> u64 {
        match self {
            Self::Token { ts, .. }
            | Self::Message { ts, .. }
            | Self::Data { ts, .. }
            | Self::Progress { ts, .. }
            | Self::Error { ts, .. }
            | Self::Complete { ts } => *ts,
        }
    }

    /// Whether this is the terminal `Complete` event.
    #[must_use]
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Build an `Error` event from a `RelayError`.
    #[must_use]
    pub fn from_relay_error(err: &RelayError, ts: u64) -> Self {
        Self::Error {
            cause: err.message.clone(),
            category: err.category.to_string(),
            ts,
        }
    }
}

/// Convenience: map an `ErrorCode` to the event category string without
/// constructing a full `RelayError`.
#[must_use]
pub fn category_for_code(code: ErrorCode) -> &'static str {
    code.category().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_accessor_covers_all_variants() {
        let events = vec![
            Event::Token { value: "a".into(), ts: 1 },
            Event::Message { value: "b".into(), role: "assistant".into(), ts: 2 },
            Event::Data { payload: serde_json::json!({}), ts: 3 },
            Event::Progress { fraction: 0.5, ts: 4 },
            Event::Error { cause: "x".into(), category: "network".into(), ts: 5 },
            Event::Complete { ts: 6 },
        ];
        let timestamps: Vec<u64> = events.iter().map(Event::ts).collect();
        assert_eq!(timestamps, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn only_complete_is_terminal_success() {
        assert!(Event::Complete { ts: 0 }.is_terminal_success());
        assert!(!Event::Token { value: String::new(), ts: 0 }.is_terminal_success());
    }

    #[test]
    fn serde_tag_shape() {
        let event = Event::Token { value: "hi".into(), ts: 10 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["value"], "hi");
    }
}
