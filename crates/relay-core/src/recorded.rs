//! Recorded events (the event-store log) and their envelope.

use serde::{Deserialize, Serialize};

use crate::ids::StreamId;

/// A single recorded event in the durable log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordedEvent {
    /// First event in every stream: the serialized run options.
    Start {
        /// `RunOptions` serialized to JSON (opaque to the store).
        serialized_options: serde_json::Value,
    },
    /// One content delta, with its position in the token sequence.
    Token {
        /// Fragment of text.
        value: String,
        /// 0-based position among tokens emitted in this stream.
        index: u64,
    },
    /// A checkpoint snapshot was taken.
    Checkpoint {
        /// Token count at the snapshot.
        at: u64,
        /// Full content at the snapshot.
        content: String,
    },
    /// A guardrail evaluation ran.
    Guardrail {
        /// Token count at evaluation time.
        at: u64,
        /// Serialized aggregate result.
        result: serde_json::Value,
    },
    /// A drift probe ran.
    Drift {
        /// Token count at evaluation time.
        at: u64,
        /// Serialized probe result.
        result: serde_json::Value,
    },
    /// A retry was taken.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Human-readable reason.
        reason: String,
        /// Whether it counted toward the model-retry budget.
        counts_toward_limit: bool,
    },
    /// The driver advanced to the next fallback stream factory.
    Fallback {
        /// New `fallback_index`.
        to: u32,
    },
    /// A resume/continuation started from a checkpoint.
    Continuation {
        /// Checkpoint content resumed from.
        checkpoint: String,
        /// Token count at resume time.
        at: u64,
    },
    /// Terminal success.
    Complete {
        /// Final accumulated content.
        content: String,
        /// Final token count.
        token_count: u64,
    },
    /// Terminal failure.
    Error {
        /// Serialized `RelayError`.
        error: serde_json::Value,
        /// Whether the underlying error was recoverable.
        recoverable: bool,
    },
}

impl RecordedEvent {
    /// Short discriminant name, useful for logging/metrics without serializing
    /// the whole payload.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START",
            Self::Token { .. } => "TOKEN",
            Self::Checkpoint { .. } => "CHECKPOINT",
            Self::Guardrail { .. } => "GUARDRAIL",
            Self::Drift { .. } => "DRIFT",
            Self::Retry { .. } => "RETRY",
            Self::Fallback { .. } => "FALLBACK",
            Self::Continuation { .. } => "CONTINUATION",
            Self::Complete { .. } => "COMPLETE",
            Self::Error { .. } => "ERROR",
        }
    }

    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// A recorded event wrapped with its stream and dense sequence number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Owning stream.
    pub stream_id: StreamId,
    /// Dense, 0-based, per-stream sequence number.
    pub seq: u64,
    /// The recorded event itself.
    pub event: RecordedEvent,
}

impl Envelope {
    /// Construct an envelope. Callers (the event store) are responsible for
    /// assigning a dense, monotone `seq`.
    #[must_use]
    pub fn new(stream_id: StreamId, seq: u64, event: RecordedEvent) -> Self {
        Self { stream_id, seq, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let e = RecordedEvent::Token { value: "x".into(), index: 0 };
        assert_eq!(e.kind(), "TOKEN");
        assert!(!e.is_terminal());
    }

    #[test]
    fn complete_and_error_are_terminal() {
        assert!(RecordedEvent::Complete { content: String::new(), token_count: 0 }.is_terminal());
        assert!(RecordedEvent::Error { error: serde_json::json!({}), recoverable: true }.is_terminal());
    }

    #[test]
    fn envelope_serde_roundtrip() {
        let stream_id = StreamId::new("s1").unwrap();
        let env = Envelope::new(stream_id, 3, RecordedEvent::Complete { content: "hi".into(), token_count: 2 });
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
