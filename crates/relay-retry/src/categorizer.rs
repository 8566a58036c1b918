//! Error categorization.

use relay_core::retry::{ErrorCategory, RetryReason};

/// An explicit classification hint a caller can supply, taking priority over
/// substring matching against the error message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorHint {
    /// The caller already knows the reason (e.g. a guardrail violation).
    Reason(RetryReason),
    /// The caller already knows the category.
    Category(ErrorCategory),
}

struct Signature {
    check: fn(&str) -> bool,
    category: ErrorCategory,
}

/// Network error signatures, checked before the generic catalog so a
/// connection-reset message doesn't get miscategorized as a 5xx.
fn network_signatures() -> &'static [Signature] {
    static SIGS: &[Signature] = &[
        Signature { check: |s| s.contains("ECONNRESET") || s.to_lowercase().contains("connection reset"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("connection dropped") || s.contains("ECONNABORTED"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("dns") || s.contains("ENOTFOUND"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("fetch failed") || s.to_lowercase().contains("failed to fetch"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("sse") && s.to_lowercase().contains("abort"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("no bytes") || s.to_lowercase().contains("partial chunk"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("background throttle") || s.to_lowercase().contains("runtime terminated"), category: ErrorCategory::Network },
        Signature { check: |s| s.to_lowercase().contains("ssl") || s.to_lowercase().contains("tls") || s.to_lowercase().contains("certificate"), category: ErrorCategory::Fatal },
        Signature { check: |s| s.to_lowercase().contains("rate limit") || s.contains("429"), category: ErrorCategory::Transient },
        Signature { check: |s| s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out"), category: ErrorCategory::Transient },
        Signature { check: |s| { let l = s.to_lowercase(); l.contains("server error") || s.contains("500") || s.contains("502") || s.contains("503") }, category: ErrorCategory::Transient },
    ];
    SIGS
}

/// Map `(message, hint)` to a category. Total: an explicit hint wins, then
/// signature matching, then a `Provider`/`Model` default.
#[must_use]
pub fn categorize(message: &str, hint: Option<ErrorHint>) -> ErrorCategory {
    if let Some(hint) = hint {
        match hint {
            ErrorHint::Category(category) => return category,
            ErrorHint::Reason(reason) => return category_for_reason(reason),
        }
    }

    for sig in network_signatures() {
        if (sig.check)(message) {
            return sig.category;
        }
    }

    // SSL/TLS takes precedence as Fatal above; generic "invalid"/"auth" failures
    // that aren't network-flavored default to Internal (misconfiguration).
    let lower = message.to_lowercase();
    if lower.contains("adapter") || lower.contains("invalid stream") || lower.contains("misconfigur") {
        return ErrorCategory::Internal;
    }
    if lower.contains("abort") || lower.contains("cancelled") || lower.contains("exhausted") {
        return ErrorCategory::Provider;
    }

    // Default-of-last-resort: treat unrecognized content as a model problem
    // rather than silently dropping it — categorization must be total.
    ErrorCategory::Model
}

fn category_for_reason(reason: RetryReason) -> ErrorCategory {
    match reason {
        RetryReason::NetworkError => ErrorCategory::Network,
        RetryReason::Timeout | RetryReason::RateLimit | RetryReason::ServerError => {
            ErrorCategory::Transient
        }
        RetryReason::ZeroOutput | RetryReason::Incomplete | RetryReason::PatternViolation => {
            ErrorCategory::Model
        }
        RetryReason::GuardrailViolation | RetryReason::Drift => ErrorCategory::Content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_reset_is_network() {
        assert_eq!(categorize("ECONNRESET: socket hang up", None), ErrorCategory::Network);
    }

    #[test]
    fn ssl_errors_are_fatal() {
        assert_eq!(categorize("unable to verify the first certificate (SSL)", None), ErrorCategory::Fatal);
    }

    #[test]
    fn rate_limit_is_transient() {
        assert_eq!(categorize("429 Too Many Requests", None), ErrorCategory::Transient);
    }

    #[test]
    fn server_error_is_transient() {
        assert_eq!(categorize("received 503 from upstream", None), ErrorCategory::Transient);
    }

    #[test]
    fn explicit_hint_overrides_message() {
        assert_eq!(
            categorize("ECONNRESET", Some(ErrorHint::Category(ErrorCategory::Model))),
            ErrorCategory::Model
        );
    }

    #[test]
    fn reason_hint_maps_through_table() {
        assert_eq!(
            categorize("whatever", Some(ErrorHint::Reason(RetryReason::Drift))),
            ErrorCategory::Content
        );
    }

    #[test]
    fn unrecognized_message_defaults_to_model() {
        assert_eq!(categorize("something bizarre happened", None), ErrorCategory::Model);
    }

    #[test]
    fn adapter_problems_are_internal() {
        assert_eq!(categorize("no adapter registered for shape", None), ErrorCategory::Internal);
    }

    #[test]
    fn abort_maps_to_provider() {
        assert_eq!(categorize("stream was aborted by caller", None), ErrorCategory::Provider);
    }
}
