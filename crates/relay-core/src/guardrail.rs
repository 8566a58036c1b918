//! Guardrail rule / violation types.

use serde::{Deserialize, Serialize};

/// Severity of a triggered rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recorded but never blocks or retries on its own.
    Warning,
    /// May request a retry if `recoverable`.
    Error,
    /// Always non-recoverable, always halts — regardless of the rule's own
    /// `recoverable` self-report.
    Fatal,
}

/// The context a rule's `check` function receives. Mirrors: `{content,
/// checkpoint, delta, token_count, completed}`.
#[derive(Clone, Debug)]
pub struct RuleCheckContext<'a> {
    /// Full accumulated content materialized so far (only guaranteed present when
    /// the rule is not `streaming`-safe, or when the slow path runs).
    pub content: &'a str,
    /// Last checkpointed content, or empty if none yet.
    pub checkpoint: &'a str,
    /// The latest delta, when evaluated on the fast/streaming path.
    pub delta: Option<&'a str>,
    /// Tokens emitted so far.
    pub token_count: u64,
    /// Whether this is the final, completed-content evaluation.
    pub completed: bool,
}

/// A single violation produced by a rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the rule that produced this violation.
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
    /// Severity as reported (before the Fatal-override rule applies).
    pub severity: Severity,
    /// Whether a retry can address this, per the rule's self-report.
    pub recoverable: bool,
    /// Byte offset into `content` where the violation was detected, if
    /// localizable.
    pub position: Option<usize>,
    /// Optional remediation hint surfaced to the caller.
    pub suggestion: Option<String>,
}

impl Violation {
    /// The effective recoverability: `Fatal` severity always wins over a rule's
    /// self-reported `recoverable` flag.
    #[must_use]
    pub fn effective_recoverable(&self) -> bool {
        self.severity != Severity::Fatal && self.recoverable
    }
}

/// A named, ordered, stateless guardrail rule. `check` is a plain function
/// pointer / boxed closure rather than a trait object-per-rule, matching the
/// reference engine's preference for small, data-driven rule structs over one
/// trait impl per rule.
pub struct GuardrailRule {
    /// Unique, stable rule name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Severity this rule reports at.
    pub severity: Severity,
    /// Whether a violation from this rule can be retried.
    pub recoverable: bool,
    /// Whether this rule is safe to call with only a delta (the fast, streaming-
    /// safe path) or needs full materialized content.
    pub streaming: bool,
    /// The check itself. Returns zero or more violations.
    pub check: Box<dyn Fn(&RuleCheckContext<'_>) -> Vec<Violation> + Send + Sync>,
}

impl GuardrailRule {
    /// Construct a rule from its pieces.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        recoverable: bool,
        streaming: bool,
        check: impl Fn(&RuleCheckContext<'_>) -> Vec<Violation> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            severity,
            recoverable,
            streaming,
            check: Box::new(check),
        }
    }

    /// Run the rule, stamping `rule`/`severity`/`recoverable` onto every produced
    /// violation so the check closure doesn't have to.
    #[must_use]
    pub fn evaluate(&self, ctx: &RuleCheckContext<'_>) -> Vec<Violation> {
        (self.check)(ctx)
            .into_iter()
            .map(|mut v| {
                v.rule = self.name.clone();
                v.severity = self.severity;
                v.recoverable = self.recoverable;
                v
            })
            .collect()
    }
}

impl std::fmt::Debug for GuardrailRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardrailRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

/// Build a minimal violation, letting `GuardrailRule::evaluate` fill in
/// `rule`/`severity`/`recoverable`.
#[must_use]
pub fn violation(message: impl Into<String>) -> Violation {
    Violation {
        rule: String::new(),
        message: message.into(),
        severity: Severity::Warning,
        recoverable: false,
        position: None,
        suggestion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_overrides_self_reported_recoverable() {
        let v = Violation {
            rule: "r".into(),
            message: "m".into(),
            severity: Severity::Fatal,
            recoverable: true,
            position: None,
            suggestion: None,
        };
        assert!(!v.effective_recoverable());
    }

    #[test]
    fn error_severity_respects_recoverable_flag() {
        let v = Violation {
            rule: "r".into(),
            message: "m".into(),
            severity: Severity::Error,
            recoverable: true,
            position: None,
            suggestion: None,
        };
        assert!(v.effective_recoverable());
    }

    #[test]
    fn rule_evaluate_stamps_metadata() {
        let rule = GuardrailRule::new(
            "test.rule",
            "desc",
            Severity::Error,
            true,
            true,
            |_ctx| vec![violation("bad")],
        );
        let ctx = RuleCheckContext {
            content: "hello",
            checkpoint: "",
            delta: Some("hello"),
            token_count: 1,
            completed: false,
        };
        let result = rule.evaluate(&ctx);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].rule, "test.rule");
        assert_eq!(result[0].severity, Severity::Error);
        assert!(result[0].recoverable);
    }
}
