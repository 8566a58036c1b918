//! The rich, caller-facing error surface.

use serde::{Deserialize, Serialize};

use crate::retry::ErrorCategory;

/// Closed set of error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// `abort()` was honored while a checkpoint existed.
    StreamAborted,
    /// No first chunk arrived within the initial-token window.
    InitialTokenTimeout,
    /// No chunk arrived within the inter-token window.
    InterTokenTimeout,
    /// Stream ended with no meaningful tokens.
    ZeroOutput,
    /// A non-fatal guardrail rule triggered and retry budget is exhausted.
    GuardrailViolation,
    /// A fatal guardrail rule triggered.
    FatalGuardrailViolation,
    /// No adapter could classify the raw stream.
    InvalidStream,
    /// Every stream factory (primary + fallbacks) is exhausted.
    AllStreamsExhausted,
    /// Connection-level failure exhausted its retry budget.
    NetworkError,
    /// Drift was detected and retry budget is exhausted.
    DriftDetected,
    /// No adapter registered for the requested type tag.
    AdapterNotFound,
    /// Caller asked for a feature that is not enabled on this session (e.g.
    /// continuation without `continue_from_last_known_good_token`).
    FeatureNotEnabled,
}

impl ErrorCode {
    /// Category this code maps to by default (a caller-supplied hint can still
    /// override this in the categorizer).
    #[must_use]
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::StreamAborted => ErrorCategory::Provider,
            Self::InitialTokenTimeout | Self::InterTokenTimeout => ErrorCategory::Transient,
            Self::ZeroOutput | Self::GuardrailViolation | Self::DriftDetected => {
                ErrorCategory::Content
            }
            Self::FatalGuardrailViolation => ErrorCategory::Fatal,
            Self::InvalidStream | Self::AdapterNotFound | Self::FeatureNotEnabled => {
                ErrorCategory::Internal
            }
            Self::AllStreamsExhausted => ErrorCategory::Provider,
            Self::NetworkError => ErrorCategory::Network,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The rich error surfaced to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayError {
    /// Closed error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Category this instance was classified into.
    pub category: ErrorCategory,
    /// Milliseconds since session start.
    pub timestamp: u64,
    /// Last known-good content, if any.
    pub checkpoint: Option<String>,
    /// Tokens emitted before the error.
    pub token_count: Option<u64>,
    /// Byte length of accumulated content before the error.
    pub content_length: Option<usize>,
    /// `model_retries` at the time of the error.
    pub model_retry_count: Option<u32>,
    /// `network_retries` at the time of the error.
    pub network_retry_count: Option<u32>,
    /// `fallback_index` at the time of the error.
    pub fallback_index: Option<u32>,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
    /// Caller-supplied immutable context, echoed back.
    pub context: Option<serde_json::Value>,
}

impl RelayError {
    /// Construct a minimal error with just a code and message; diagnostic fields
    /// default to `None` and can be filled in with the builder methods below.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, timestamp: u64) -> Self {
        let category = code.category();
        Self {
            code,
            message: message.into(),
            category,
            timestamp,
            checkpoint: None,
            token_count: None,
            content_length: None,
            model_retry_count: None,
            network_retry_count: None,
            fallback_index: None,
            metadata: None,
            context: None,
        }
    }

    /// Attach a checkpoint (and derive `content_length` from it if unset).
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        let checkpoint = checkpoint.into();
        if self.content_length.is_none() {
            self.content_length = Some(checkpoint.len());
        }
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Attach a token count.
    #[must_use]
    pub fn with_token_count(mut self, token_count: u64) -> Self {
        self.token_count = Some(token_count);
        self
    }

    /// Attach retry counters.
    #[must_use]
    pub fn with_retry_counts(mut self, model: u32, network: u32) -> Self {
        self.model_retry_count = Some(model);
        self.network_retry_count = Some(network);
        self
    }

    /// Attach the fallback index.
    #[must_use]
    pub fn with_fallback_index(mut self, index: u32) -> Self {
        self.fallback_index = Some(index);
        self
    }

    /// Attach caller context (echoed verbatim).
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether a non-empty checkpoint is attached.
    #[must_use]
    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Whether this error's category makes it retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Serialize to the JSON shape describes, with the derived `has_checkpoint`
    /// boolean included.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut value {
            let _ = map.insert("has_checkpoint".to_owned(), serde_json::json!(self.has_checkpoint()));
        }
        value
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.category, self.message)
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_category_mapping() {
        assert_eq!(ErrorCode::NetworkError.category(), ErrorCategory::Network);
        assert_eq!(ErrorCode::FatalGuardrailViolation.category(), ErrorCategory::Fatal);
        assert_eq!(ErrorCode::InitialTokenTimeout.category(), ErrorCategory::Transient);
    }

    #[test]
    fn has_checkpoint_derivation() {
        let err = RelayError::new(ErrorCode::StreamAborted, "aborted", 10);
        assert!(!err.has_checkpoint());
        let err = err.with_checkpoint("hello");
        assert!(err.has_checkpoint());
        assert_eq!(err.content_length, Some(5));

        let empty = RelayError::new(ErrorCode::StreamAborted, "aborted", 10).with_checkpoint("");
        assert!(!empty.has_checkpoint());
    }

    #[test]
    fn to_json_includes_has_checkpoint() {
        let err = RelayError::new(ErrorCode::ZeroOutput, "no output", 5).with_checkpoint("abc");
        let json = err.to_json();
        assert_eq!(json["has_checkpoint"], true);
        assert_eq!(json["code"], "ZERO_OUTPUT");
    }

    #[test]
    fn serde_roundtrip_recovers_fields() {
        let err = RelayError::new(ErrorCode::NetworkError, "reset", 1)
            .with_retry_counts(2, 3)
            .with_fallback_index(1);
        let json = serde_json::to_string(&err).unwrap();
        let back: RelayError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model_retry_count, Some(2));
        assert_eq!(back.network_retry_count, Some(3));
        assert_eq!(back.fallback_index, Some(1));
        assert_eq!(back.message, "reset");
    }
}
