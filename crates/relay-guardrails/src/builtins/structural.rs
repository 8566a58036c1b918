//! Structural validity rules: JSON, Markdown, LaTeX.
//!
//! These need the fully materialized content (they check balance across
//! the whole document), so `streaming=false`: the engine only calls
//! them on the final/completed pass.

use relay_core::guardrail::{violation, GuardrailRule, Severity};

/// Flags content whose first non-whitespace character looks like JSON
/// (`{` or `[`) but that fails to parse as JSON at completion.
#[must_use]
pub fn json_validity() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.structural.json-validity",
        "Completed content that looks like JSON must parse as JSON",
        Severity::Error,
        true,
        false,
        |ctx| {
            let trimmed = ctx.content.trim_start();
            let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
            if !looks_like_json {
                return Vec::new();
            }
            match serde_json::from_str::<serde_json::Value>(ctx.content) {
                Ok(_) => Vec::new(),
                Err(err) => vec![violation(format!("content looks like JSON but failed to parse: {err}"))],
            }
        },
    )
}

/// Flags unbalanced fenced code blocks (an odd number of ``` fences).
#[must_use]
pub fn markdown_validity() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.structural.markdown-validity",
        "Fenced code blocks must be balanced",
        Severity::Warning,
        true,
        false,
        |ctx| {
            let fence_count = ctx.content.matches("```").count();
            if fence_count % 2 != 0 {
                vec![violation("unbalanced markdown code fence (``` count is odd)")]
            } else {
                Vec::new()
            }
        },
    )
}

/// Flags unbalanced `\begin{...}`/`\end{...}` environment pairs.
#[must_use]
pub fn latex_validity() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.structural.latex-validity",
        "LaTeX begin/end environments must balance",
        Severity::Warning,
        true,
        false,
        |ctx| {
            let begins = ctx.content.matches(r"\begin{").count();
            let ends = ctx.content.matches(r"\end{").count();
            if begins != ends {
                vec![violation(format!(
                    "unbalanced LaTeX environments: {begins} \\begin vs {ends} \\end"
                ))]
            } else {
                Vec::new()
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::guardrail::RuleCheckContext;

    fn final_ctx(content: &str) -> RuleCheckContext<'_> {
        RuleCheckContext { content, checkpoint: "", delta: None, token_count: 1, completed: true }
    }

    #[test]
    fn valid_json_passes() {
        let rule = json_validity();
        assert!(rule.evaluate(&final_ctx(r#"{"a": 1}"#)).is_empty());
    }

    #[test]
    fn malformed_json_flagged() {
        let rule = json_validity();
        assert_eq!(rule.evaluate(&final_ctx(r#"{"a": }"#)).len(), 1);
    }

    #[test]
    fn prose_is_not_treated_as_json() {
        let rule = json_validity();
        assert!(rule.evaluate(&final_ctx("just some prose { not json")).is_empty());
    }

    #[test]
    fn balanced_fences_pass() {
        let rule = markdown_validity();
        assert!(rule.evaluate(&final_ctx("```rust\nfn main() {}\n```")).is_empty());
    }

    #[test]
    fn unbalanced_fences_flagged() {
        let rule = markdown_validity();
        assert_eq!(rule.evaluate(&final_ctx("```rust\nfn main() {}\n")).len(), 1);
    }

    #[test]
    fn balanced_latex_passes() {
        let rule = latex_validity();
        assert!(rule.evaluate(&final_ctx(r"\begin{align}x\end{align}")).is_empty());
    }

    #[test]
    fn unbalanced_latex_flagged() {
        let rule = latex_validity();
        assert_eq!(rule.evaluate(&final_ctx(r"\begin{align}x")).len(), 1);
    }
}
