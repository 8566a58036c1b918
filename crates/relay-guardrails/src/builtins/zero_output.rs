//! Zero-output detection.

use relay_core::guardrail::{violation, GuardrailRule, Severity};

/// Flags a completed stream whose accumulated content is empty or whitespace-
/// only.
#[must_use]
pub fn zero_output_detection() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.zero-output",
        "A completed stream must produce non-whitespace content",
        Severity::Error,
        true,
        false,
        |ctx| {
            if ctx.completed && ctx.content.trim().is_empty() {
                vec![violation("stream completed with zero meaningful output")]
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

    #[test]
    fn empty_completed_content_flagged() {
        let rule = zero_output_detection();
        let ctx = RuleCheckContext { content: "   \n", checkpoint: "", delta: None, token_count: 0, completed: true };
        assert_eq!(rule.evaluate(&ctx).len(), 1);
    }

    #[test]
    fn non_empty_completed_content_passes() {
        let rule = zero_output_detection();
        let ctx = RuleCheckContext { content: "hi", checkpoint: "", delta: None, token_count: 1, completed: true };
        assert!(rule.evaluate(&ctx).is_empty());
    }

    #[test]
    fn mid_stream_empty_content_not_flagged() {
        let rule = zero_output_detection();
        let ctx = RuleCheckContext { content: "", checkpoint: "", delta: Some(""), token_count: 0, completed: false };
        assert!(rule.evaluate(&ctx).is_empty());
    }
}
