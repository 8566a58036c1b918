//! The guardrail evaluation engine.

use relay_core::constants::GUARDRAIL_FAST_PATH_THRESHOLD_BYTES;
use relay_core::guardrail::{GuardrailRule, RuleCheckContext, Severity, Violation};

/// Aggregate result of one evaluation pass.
#[derive(Clone, Debug, Default)]
pub struct Evaluation {
    /// All violations produced by all rules, in rule order.
    pub violations: Vec<Violation>,
    /// `true` iff any violation has `severity=fatal`.
    pub should_halt: bool,
    /// `true` iff at least one violation is recoverable and `should_halt` is
    /// false.
    pub should_retry: bool,
    /// `true` when this evaluation took the slow path and was deferred to the
    /// next cooperative yield rather than completed inline.
    pub deferred: bool,
}

impl Evaluation {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let should_halt = violations.iter().any(|v| v.severity == Severity::Fatal);
        let should_retry = !should_halt && violations.iter().any(Violation::effective_recoverable);
        Self { violations, should_halt, should_retry, deferred: false }
    }

    fn deferred_pending() -> Self {
        Self { violations: Vec::new(), should_halt: false, should_retry: false, deferred: true }
    }
}

/// An ordered collection of guardrail rules, evaluated in registration order
/// and short-circuited on the first `fatal` violation.
pub struct GuardrailEngine {
    rules: Vec<GuardrailRule>,
}

impl GuardrailEngine {
    /// An engine with no rules registered.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// An engine seeded with the built-in rule catalog
    /// (`relay_guardrails::builtins::default_rules`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut engine = Self::new();
        for rule in crate::builtins::default_rules() {
            engine.register(rule);
        }
        engine
    }

    /// Append a rule to the end of the evaluation order.
    pub fn register(&mut self, rule: GuardrailRule) {
        self.rules.push(rule);
    }

    /// Remove a rule by name. Returns `true` if a rule was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.rules.len() != before
    }

    /// All registered rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[GuardrailRule] {
        &self.rules
    }

    /// Evaluate every rule in order, short-circuiting once a fatal violation is
    /// found. Runs synchronously regardless of content size — callers decide
    /// whether to take the fast or slow path via
    /// [`GuardrailEngine::evaluate_tiered`].
    #[must_use]
    pub fn evaluate(&self, ctx: &RuleCheckContext<'_>) -> Evaluation {
        let mut violations = Vec::new();
        for rule in &self.rules {
            if ctx.delta.is_some() && !rule.streaming && !ctx.completed {
                continue;
            }
            let mut produced = rule.evaluate(ctx);
            let has_fatal = produced.iter().any(|v| v.severity == Severity::Fatal);
            violations.append(&mut produced);
            if has_fatal {
                break;
            }
        }
        Evaluation::from_violations(violations)
    }

    /// The fast/slow tiered evaluation described in: a short delta under the
    /// streaming-safe byte threshold runs synchronously against streaming-safe
    /// rules only; anything larger reports `deferred=true` and the caller is
    /// expected to invoke [`GuardrailEngine::evaluate_full`] at the next
    /// cooperative yield.
    #[must_use]
    pub fn evaluate_tiered(&self, ctx: &RuleCheckContext<'_>) -> Evaluation {
        let is_small = ctx.content.len() < GUARDRAIL_FAST_PATH_THRESHOLD_BYTES;
        if ctx.delta.is_some() && is_small {
            return self.evaluate_fast_path(ctx);
        }
        Evaluation::deferred_pending()
    }

    /// Run only the streaming-safe rules against the delta. Always synchronous;
    /// intended for content below the fast-path threshold.
    #[must_use]
    pub fn evaluate_fast_path(&self, ctx: &RuleCheckContext<'_>) -> Evaluation {
        let mut violations = Vec::new();
        for rule in &self.rules {
            if !rule.streaming {
                continue;
            }
            let mut produced = rule.evaluate(ctx);
            let has_fatal = produced.iter().any(|v| v.severity == Severity::Fatal);
            violations.append(&mut produced);
            if has_fatal {
                break;
            }
        }
        Evaluation::from_violations(violations)
    }

    /// Run the complete rule set (streaming and full-content rules alike) against
    /// materialized content. This is the slow path's eventual completion, and
    /// also the pass run on final/completed content.
    #[must_use]
    pub fn evaluate_full(&self, ctx: &RuleCheckContext<'_>) -> Evaluation {
        self.evaluate(ctx)
    }
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GuardrailEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailEngine").field("rule_count", &self.rules.len()).finish()
    }
}
