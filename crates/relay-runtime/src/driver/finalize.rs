//! Terminal-pass finalization: zero-output detection, the completed- content
//! guardrail pass, and the final drift probe.

use relay_core::guardrail::RuleCheckContext;
use relay_core::retry::RetryReason;
use relay_core::session::SessionSnapshot;
use relay_guardrails::GuardrailEngine;

/// What the terminal pass decided.
pub enum FinalizeOutcome {
    /// Nothing objected; the session may complete.
    Success,
    /// Something recoverable fired; feed `reason` into the retry manager rather
    /// than completing.
    Retry { reason: RetryReason, message: String },
    /// A fatal guardrail violation fired; no retry is offered.
    Fatal { message: String },
}

/// Run the terminal checks against `session`'s fully materialized content,
/// recording every violation produced along the way.
pub fn finalize(session: &mut SessionSnapshot, guardrails: &GuardrailEngine, detect_drift: bool, detect_zero_tokens: bool) -> FinalizeOutcome {
    if detect_zero_tokens && session.content.trim().is_empty() {
        return FinalizeOutcome::Retry { reason: RetryReason::ZeroOutput, message: "stream completed with zero meaningful output".to_owned() };
    }

    let ctx = RuleCheckContext {
        content: &session.content,
        checkpoint: &session.checkpoint,
        delta: None,
        token_count: session.token_count,
        completed: true,
    };
    let evaluation = guardrails.evaluate_full(&ctx);
    session.violations.extend(evaluation.violations.iter().cloned());

    if evaluation.should_halt {
        let message = evaluation
            .violations
            .iter()
            .find(|v| v.severity == relay_core::guardrail::Severity::Fatal)
            .map_or_else(|| "fatal guardrail violation".to_owned(), |v| v.message.clone());
        return FinalizeOutcome::Fatal { message };
    }
    if evaluation.should_retry {
        let message = evaluation.violations.first().map_or_else(|| "guardrail violation".to_owned(), |v| v.message.clone());
        return FinalizeOutcome::Retry { reason: RetryReason::GuardrailViolation, message };
    }

    if detect_drift {
        let drift = relay_drift::detect(&session.content, None);
        if drift.detected {
            session.drift_detected = true;
            return FinalizeOutcome::Retry {
                reason: RetryReason::Drift,
                message: format!("drift detected (confidence {:.2})", drift.confidence),
            };
        }
    }

    FinalizeOutcome::Success
}
