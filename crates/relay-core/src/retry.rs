//! Retry configuration and the closed error taxonomy. Pure types and math
//! only — the async execution (sleeping, invoking
//! `should_retry`/`calculate_delay` hooks) lives in `relay-retry`, the

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_ERROR_HISTORY;

/// Six-category error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Connection resets, DNS failures, dropped SSE connections. Never counts
    /// toward the model-retry budget.
    Network,
    /// Timeouts, rate limits, 5xx. Retryable, does not count toward the model-
    /// retry budget.
    Transient,
    /// Zero output, incomplete output, pattern violations. Counts toward the
    /// model-retry budget.
    Model,
    /// Guardrail/drift violations on content. Counts toward the model-retry
    /// budget.
    Content,
    /// Misconfiguration, adapter-not-found, invalid stream shape. Never retried.
    Internal,
    /// Aborts and wrapper-level stream exhaustion.
    Provider,
    /// Fatal guardrail violations, TLS validation failures. Never retried, short-
    /// circuits fallback.
    Fatal,
}

impl ErrorCategory {
    /// Whether this category counts against `attempts_limit` / `model_retries`.
    #[must_use]
    pub fn counts_toward_limit(self) -> bool {
        matches!(self, Self::Model | Self::Content)
    }

    /// Whether errors in this category are retryable at all. `Fatal` and
    /// `Internal` are never retried.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Internal | Self::Fatal)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).into())
    }
}

impl From<ErrorCategory> for &'static str {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Network => "network",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Model => "model",
            ErrorCategory::Content => "content",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Provider => "provider",
            ErrorCategory::Fatal => "fatal",
        }
    }
}

/// Closed set of retry reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    /// Stream completed with no meaningful tokens.
    ZeroOutput,
    /// A non-fatal guardrail rule flagged content.
    GuardrailViolation,
    /// Drift detector flagged repetition/meta-commentary/topic shift.
    Drift,
    /// Stream ended in a state that looks unfinished.
    Incomplete,
    /// Connection-level failure.
    NetworkError,
    /// Initial-token or inter-token timeout fired.
    Timeout,
    /// Provider returned a rate-limit response.
    RateLimit,
    /// Provider returned a 5xx.
    ServerError,
    /// A built-in pattern rule (meta-commentary, refusal,...) matched.
    PatternViolation,
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ZeroOutput => "zero_output",
            Self::GuardrailViolation => "guardrail_violation",
            Self::Drift => "drift",
            Self::Incomplete => "incomplete",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::PatternViolation => "pattern_violation",
        };
        f.write_str(s)
    }
}

/// Backoff strategy. All six variants compute a delay in milliseconds from
/// `(attempt, base, max)` plus, for the jittered variants, a source of
/// randomness supplied by the caller (`relay-retry` wires in `rand`; this
/// crate stays deterministic and I/O-free).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffStrategy {
    /// `delay = min(base * 2^attempt, max)`.
    Exponential,
    /// `delay = min(base * (attempt + 1), max)`.
    Linear,
    /// `delay = base`, constant.
    Fixed,
    /// `delay = uniform(0, min(base * 2^attempt, max))`.
    FullJitter,
    /// `delay = base + uniform(0, base)`.
    FixedJitter,
    /// `delay = min(max, uniform(base, prev * 3))`.
    DecorrelatedJitter,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

fn default_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_retry_on() -> HashSet<RetryReason> {
    [
        RetryReason::ZeroOutput,
        RetryReason::GuardrailViolation,
        RetryReason::Drift,
        RetryReason::Incomplete,
        RetryReason::NetworkError,
        RetryReason::Timeout,
        RetryReason::RateLimit,
        RetryReason::ServerError,
        RetryReason::PatternViolation,
    ]
    .into_iter()
    .collect()
}
fn default_max_error_history() -> Option<usize> {
    Some(DEFAULT_MAX_ERROR_HISTORY)
}

/// Retry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Model-retry attempt budget (the session's `attempts_limit`).
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Absolute cap across *all* categories, regardless of whether they count
    /// toward `attempts`. `None` means unbounded.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Base delay for backoff math, milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap, milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Which reasons are eligible for retry at all.
    #[serde(default = "default_retry_on")]
    pub retry_on: HashSet<RetryReason>,
    /// Per-network-error-type delay overrides, keyed by a short type tag (e.g.
    /// `"ssl"`, `"dns"`, `"background_throttle"`).
    #[serde(default)]
    pub error_type_delays: HashMap<String, u64>,
    /// Bound on the retry manager's error-history ring buffer.
    #[serde(default = "default_max_error_history")]
    pub max_error_history: Option<usize>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            max_retries: None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            retry_on: default_retry_on(),
            error_type_delays: default_network_error_delays(),
            max_error_history: default_max_error_history(),
        }
    }
}

/// Default per-error-type delay overrides: SSL errors delay 0ms (and are
/// non-retryable), DNS errors default to 3s, background throttle to 5s.
fn default_network_error_delays() -> HashMap<String, u64> {
    let mut m = HashMap::new();
    let _ = m.insert("ssl".to_owned(), 0);
    let _ = m.insert("dns".to_owned(), 3_000);
    let _ = m.insert("background_throttle".to_owned(), 5_000);
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_counts_toward_limit() {
        assert!(ErrorCategory::Model.counts_toward_limit());
        assert!(ErrorCategory::Content.counts_toward_limit());
        assert!(!ErrorCategory::Network.counts_toward_limit());
        assert!(!ErrorCategory::Transient.counts_toward_limit());
        assert!(!ErrorCategory::Internal.counts_toward_limit());
        assert!(!ErrorCategory::Fatal.counts_toward_limit());
    }

    #[test]
    fn fatal_and_internal_never_retryable() {
        assert!(!ErrorCategory::Fatal.is_retryable());
        assert!(!ErrorCategory::Internal.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
    }

    #[test]
    fn retry_config_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.attempts, 3);
        assert_eq!(cfg.max_retries, None);
        assert_eq!(cfg.error_type_delays.get("ssl"), Some(&0));
        assert_eq!(cfg.error_type_delays.get("dns"), Some(&3_000));
    }

    #[test]
    fn retry_config_serde_roundtrip() {
        let cfg = RetryConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attempts, cfg.attempts);
        assert_eq!(back.backoff, cfg.backoff);
    }

    #[test]
    fn retry_config_serde_fills_defaults() {
        let cfg: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.attempts, 3);
        assert_eq!(cfg.backoff, BackoffStrategy::Exponential);
    }
}
