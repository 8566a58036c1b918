//! The fixed observability-event catalog: a superset of recorded events
//! plus internal transitions. Every observability event carries `{type,
//! ts, stream_id, context?}` plus a type-specific payload with a stable
//! field schema.

use serde::{Deserialize, Serialize};

use relay_core::ids::StreamId;

/// One entry in the catalog. Tagged the way
/// `relay_core::recorded::RecordedEvent` and
/// `relay_core::session::SessionState` are tagged — `SCREAMING_SNAKE_CASE` —
/// since these type strings are the catalog's public, stable names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservabilityEvent {
    /// Fires exactly once per session.
    SessionStart,
    /// Fires on every attempt, including the first and every retry.
    AttemptStart {
        /// 1-based attempt number within the current fallback stream.
        attempt: u32,
        /// Index into `stream_factories` for the attempt's stream.
        fallback_index: u32,
    },
    /// Fires when the retry policy decides to retry; precedes the `AttemptStart`
    /// it causes.
    RetryAttempt {
        /// 1-based attempt number about to begin.
        attempt: u32,
        /// Human-readable reason for the retry.
        reason: String,
        /// Backoff delay before the next attempt, milliseconds.
        delay_ms: u64,
    },
    /// Fires on every fallback advance. Distinct from `AttemptStart`.
    FallbackStart {
        /// New `fallback_index`.
        fallback_index: u32,
    },
    /// Fires when a fallback or retry resumes from a checkpoint.
    ResumeStart {
        /// Length of the checkpoint content being resumed from.
        checkpoint_len: usize,
    },
    /// The caller's abort signal (or an internally-OR'd one) fired.
    AbortRequested,
    /// Abort handling finished and resources were released.
    AbortCompleted,
    /// An initial-token or inter-token timeout fired.
    TimeoutTriggered {
        /// Which timeout: `"initial_token"` or `"inter_token"`.
        kind: String,
    },
    /// A checkpoint snapshot was taken.
    CheckpointSaved {
        /// Token count at the snapshot.
        at: u64,
    },
    /// A guardrail rule flagged content.
    GuardrailViolation {
        /// The rule that fired.
        rule_id: String,
        /// Its severity.
        severity: String,
        /// Whether the violation was ultimately recoverable.
        recoverable: bool,
    },
    /// The drift detector flagged content.
    DriftDetected {
        /// Drift type tags.
        types: Vec<String>,
        /// Aggregate confidence, 0.0-1.0.
        confidence: f64,
    },
    /// A `message`-type event matched one of the recognized tool-call shapes.
    ToolRequested {
        /// Tool-call ID (synthesized as `fn_<ts>` for the legacy shape).
        id: String,
        /// Tool name.
        name: String,
        /// Parsed arguments; malformed JSON degrades to `{}`.
        arguments: serde_json::Value,
    },
    /// A matching `tool_result` event arrived for a non-error result.
    ToolResult {
        /// Tool-call ID this result answers.
        id: String,
        /// Result payload.
        value: serde_json::Value,
    },
    /// A matching `tool_result` event arrived carrying an error.
    ToolError {
        /// Tool-call ID this result answers.
        id: String,
        /// Error message.
        error: String,
    },
    /// Fires alongside `ToolResult`/`ToolError`, keyed by id, marking the tool-
    /// call lifecycle complete.
    ToolCompleted {
        /// Tool-call ID.
        id: String,
    },
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Error {
        /// Closed error code string.
        code: String,
        /// Whether the underlying error was recoverable.
        recoverable: bool,
    },
}

impl ObservabilityEvent {
    /// The catalog type string, matching the `type` tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStart => "SESSION_START",
            Self::AttemptStart { .. } => "ATTEMPT_START",
            Self::RetryAttempt { .. } => "RETRY_ATTEMPT",
            Self::FallbackStart { .. } => "FALLBACK_START",
            Self::ResumeStart { .. } => "RESUME_START",
            Self::AbortRequested => "ABORT_REQUESTED",
            Self::AbortCompleted => "ABORT_COMPLETED",
            Self::TimeoutTriggered { .. } => "TIMEOUT_TRIGGERED",
            Self::CheckpointSaved { .. } => "CHECKPOINT_SAVED",
            Self::GuardrailViolation { .. } => "GUARDRAIL_VIOLATION",
            Self::DriftDetected { .. } => "DRIFT_DETECTED",
            Self::ToolRequested { .. } => "TOOL_REQUESTED",
            Self::ToolResult { .. } => "TOOL_RESULT",
            Self::ToolError { .. } => "TOOL_ERROR",
            Self::ToolCompleted { .. } => "TOOL_COMPLETED",
            Self::Complete => "COMPLETE",
            Self::Error { .. } => "ERROR",
        }
    }
}

/// The envelope every event is wrapped in before reaching a sink. `context`
/// is the caller-supplied immutable value from `RunOptions::meta`, attached
/// verbatim to every event in a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityEnvelope {
    /// Monotone timestamp, milliseconds since session start.
    pub ts: u64,
    /// Constant across the whole session.
    pub stream_id: StreamId,
    /// Caller-supplied immutable context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// The type-specific payload.
    #[serde(flatten)]
    pub event: ObservabilityEvent,
}
