//! The retry manager. Decides retry vs. surface, computes delay, and enforces
//! both the model-retry budget and the absolute cap across all categories.

use relay_core::retry::{BackoffStrategy, ErrorCategory, RetryConfig, RetryReason};

use crate::backoff::calculate_delay;
use crate::categorizer::{categorize, ErrorHint};
use crate::history::{ErrorHistory, HistoryEntry};

/// Everything the manager needs to make one retry decision.
#[derive(Clone, Debug)]
pub struct DecideContext<'a> {
    /// The retry reason, when known (`None` for a raw network failure classified
    /// purely from its message).
    pub reason: Option<RetryReason>,
    /// Human-readable error message, used for pattern-based categorization and
    /// recorded into history.
    pub message: &'a str,
    /// Explicit caller hint, takes priority over message matching.
    pub hint: Option<ErrorHint>,
    /// A short type tag for `error_type_delays` lookups (e.g. `"dns"`, `"ssl"`,
    /// `"background_throttle"`). `None` if not applicable.
    pub error_type: Option<&'a str>,
    /// 1-based attempt number *within the current category's counting* — used for
    /// exponential/linear backoff growth.
    pub attempt: u32,
    /// Current `model_retries` on the session.
    pub model_retries: u32,
    /// Current `network_retries` on the session.
    pub network_retries: u32,
    /// Current "other" retries on the session (transient/provider/etc, counted
    /// only against the absolute cap).
    pub transient_retries: u32,
    /// Session clock, milliseconds, for history timestamps.
    pub now_ms: u64,
    /// Previous computed delay for this category, for decorrelated jitter
    /// continuity. `None` on the first retry.
    pub prev_delay_ms: Option<u64>,
}

/// Outcome of a retry decision.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryDecision {
    /// Whether to retry at all.
    pub should_retry: bool,
    /// Category the error was classified into.
    pub category: ErrorCategory,
    /// Whether this retry (if taken) counts toward `attempts` (`model_retries`),
    /// per `ErrorCategory::counts_toward_limit`.
    pub counts_toward_limit: bool,
    /// Delay to wait before the next attempt, milliseconds. Meaningless when
    /// `should_retry` is false.
    pub delay_ms: u64,
    /// Human-readable reason the decision was made, surfaced in
    /// `RETRY_ATTEMPT`/error messages (e.g. `"Absolute maximum retries (N)
    /// reached"`).
    pub explanation: String,
}

/// Optional caller hooks overriding the manager's own decision.
pub trait RetryHooks {
    /// Return `Some(bool)` to override whether to retry, `None` to defer to the
    /// manager's own logic.
    fn should_retry(&self, _category: ErrorCategory, _reason: Option<RetryReason>) -> Option<bool> {
        None
    }
    /// Return `Some(ms)` to override the computed delay, `None` to defer.
    fn calculate_delay(&self, _category: ErrorCategory, _attempt: u32) -> Option<u64> {
        None
    }
}

/// The retry manager: holds config + bounded error history, makes retry/delay
/// decisions.
pub struct RetryManager {
    config: RetryConfig,
    history: ErrorHistory,
}

impl RetryManager {
    /// Build a manager from a retry configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let history = ErrorHistory::new(config.max_error_history);
        Self { config, history }
    }

    /// Borrow the error history.
    #[must_use]
    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    /// Borrow the retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decide whether/how to retry. `hooks`, if supplied, can override both the
    /// retry decision and the delay.
    pub fn decide(&mut self, ctx: &DecideContext<'_>, hooks: Option<&dyn RetryHooks>) -> RetryDecision {
        let category = match ctx.hint {
            Some(hint) => categorize(ctx.message, Some(hint)),
            None => match ctx.reason {
                Some(reason) => categorize(ctx.message, Some(ErrorHint::Reason(reason))),
                None => categorize(ctx.message, None),
            },
        };

        self.history.push(HistoryEntry {
            category,
            message: ctx.message.to_owned(),
            at_ms: ctx.now_ms,
        });

        let counts_toward_limit = category.counts_toward_limit();

        // Absolute cap check first: it short-circuits everything else.
        if let Some(max) = self.config.max_retries {
            let total = ctx.model_retries + ctx.network_retries + ctx.transient_retries;
            if total >= max {
                return RetryDecision {
                    should_retry: false,
                    category,
                    counts_toward_limit,
                    delay_ms: 0,
                    explanation: format!("Absolute maximum retries ({max}) reached"),
                };
            }
        }

        if !category.is_retryable() {
            return RetryDecision {
                should_retry: false,
                category,
                counts_toward_limit,
                delay_ms: 0,
                explanation: format!("category {category} is not retryable"),
            };
        }

        if counts_toward_limit && ctx.model_retries >= self.config.attempts {
            return RetryDecision {
                should_retry: false,
                category,
                counts_toward_limit,
                delay_ms: 0,
                explanation: format!("model retry budget ({}) exhausted", self.config.attempts),
            };
        }

        if let Some(reason) = ctx.reason {
            if !self.config.retry_on.contains(&reason) {
                return RetryDecision {
                    should_retry: false,
                    category,
                    counts_toward_limit,
                    delay_ms: 0,
                    explanation: format!("reason {reason} is not in retry_on"),
                };
            }
        }

        let should_retry = hooks
            .and_then(|h| h.should_retry(category, ctx.reason))
            .unwrap_or(true);

        if !should_retry {
            return RetryDecision {
                should_retry: false,
                category,
                counts_toward_limit,
                delay_ms: 0,
                explanation: "caller hook declined retry".to_owned(),
            };
        }

        let delay_ms = hooks
            .and_then(|h| h.calculate_delay(category, ctx.attempt))
            .unwrap_or_else(|| self.compute_delay(ctx, category));

        RetryDecision {
            should_retry: true,
            category,
            counts_toward_limit,
            delay_ms,
            explanation: format!("retrying as {category}"),
        }
    }

    fn compute_delay(&self, ctx: &DecideContext<'_>, category: ErrorCategory) -> u64 {
        if let Some(error_type) = ctx.error_type {
            if let Some(&override_ms) = self.config.error_type_delays.get(error_type) {
                return override_ms;
            }
        }

        let strategy = self.strategy_for(category);
        let random = pseudo_random(ctx.now_ms, ctx.attempt);
        calculate_delay(
            strategy,
            ctx.attempt,
            self.config.base_delay_ms,
            self.config.max_delay_ms,
            ctx.prev_delay_ms,
            random,
        )
    }

    fn strategy_for(&self, _category: ErrorCategory) -> BackoffStrategy {
        self.config.backoff
    }
}

/// Deterministic stand-in for `rand::random::<f64>()` used only when the
/// caller doesn't supply its own randomness via a `RetryHooks` override.
/// Production call sites in `relay-runtime` source real randomness from
/// `rand` and pass it through `calculate_delay` directly instead; this helper
/// exists so `RetryManager::decide` stays synchronous and dependency-free of
/// a thread-local RNG for deterministic tests.
fn pseudo_random(seed_a: u64, seed_b: u32) -> f64 {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(seed_a ^ u64::from(seed_b));
    rng.random::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(model_retries: u32, network_retries: u32) -> DecideContext<'static> {
        DecideContext {
            reason: None,
            message: "ECONNRESET",
            hint: None,
            error_type: None,
            attempt: 1,
            model_retries,
            network_retries,
            transient_retries: 0,
            now_ms: 0,
            prev_delay_ms: None,
        }
    }

    #[test]
    fn network_error_does_not_count_toward_limit() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let decision = mgr.decide(&ctx(0, 0), None);
        assert!(decision.should_retry);
        assert!(!decision.counts_toward_limit);
        assert_eq!(decision.category, ErrorCategory::Network);
    }

    #[test]
    fn model_budget_exhausted_blocks_retry() {
        let mut cfg = RetryConfig::default();
        cfg.attempts = 1;
        let mut mgr = RetryManager::new(cfg);
        let mut c = ctx(0, 0);
        c.message = "the model produced zero output";
        c.reason = Some(RetryReason::ZeroOutput);
        c.model_retries = 1; // already at budget
        let decision = mgr.decide(&c, None);
        assert!(!decision.should_retry);
        assert!(decision.explanation.contains("model retry budget"));
    }

    #[test]
    fn absolute_cap_short_circuits() {
        let mut cfg = RetryConfig::default();
        cfg.max_retries = Some(3);
        cfg.attempts = 100;
        let mut mgr = RetryManager::new(cfg);
        let mut c = ctx(1, 1);
        c.transient_retries = 1; // total = 3
        let decision = mgr.decide(&c, None);
        assert!(!decision.should_retry);
        assert!(decision.explanation.contains("Absolute maximum retries (3) reached"));
    }

    #[test]
    fn fatal_category_never_retries() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let mut c = ctx(0, 0);
        c.message = "SSL certificate verification failed";
        let decision = mgr.decide(&c, None);
        assert_eq!(decision.category, ErrorCategory::Fatal);
        assert!(!decision.should_retry);
    }

    #[test]
    fn error_type_delay_overrides_backoff() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let mut c = ctx(0, 0);
        c.error_type = Some("dns");
        c.message = "DNS lookup failed";
        let decision = mgr.decide(&c, None);
        assert_eq!(decision.delay_ms, 3_000);
    }

    #[test]
    fn ssl_error_type_delay_is_zero() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let mut c = ctx(0, 0);
        c.error_type = Some("ssl");
        c.message = "certificate error";
        let decision = mgr.decide(&c, None);
        // Fatal, so not retried regardless of delay override.
        assert!(!decision.should_retry);
        assert_eq!(decision.delay_ms, 0);
    }

    struct AlwaysDecline;
    impl RetryHooks for AlwaysDecline {
        fn should_retry(&self, _: ErrorCategory, _: Option<RetryReason>) -> Option<bool> {
            Some(false)
        }
    }

    #[test]
    fn caller_hook_can_decline_retry() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let decision = mgr.decide(&ctx(0, 0), Some(&AlwaysDecline));
        assert!(!decision.should_retry);
        assert_eq!(decision.explanation, "caller hook declined retry");
    }

    struct FixedDelay(u64);
    impl RetryHooks for FixedDelay {
        fn calculate_delay(&self, _: ErrorCategory, _: u32) -> Option<u64> {
            Some(self.0)
        }
    }

    #[test]
    fn caller_hook_can_override_delay() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let decision = mgr.decide(&ctx(0, 0), Some(&FixedDelay(42)));
        assert_eq!(decision.delay_ms, 42);
    }

    #[test]
    fn retry_on_excludes_unlisted_reasons() {
        let mut cfg = RetryConfig::default();
        cfg.retry_on.remove(&RetryReason::Drift);
        let mut mgr = RetryManager::new(cfg);
        let mut c = ctx(0, 0);
        c.reason = Some(RetryReason::Drift);
        c.message = "drift detected";
        let decision = mgr.decide(&c, None);
        assert!(!decision.should_retry);
        assert!(decision.explanation.contains("not in retry_on"));
    }

    #[test]
    fn history_accumulates_across_decisions() {
        let mut mgr = RetryManager::new(RetryConfig::default());
        let _ = mgr.decide(&ctx(0, 0), None);
        let _ = mgr.decide(&ctx(0, 1), None);
        assert_eq!(mgr.history().len(), 2);
    }
}
