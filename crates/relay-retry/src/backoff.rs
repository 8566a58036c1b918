//! Backoff math for all six strategies.

use relay_core::retry::BackoffStrategy;

/// Compute the delay, in milliseconds, for the given strategy/attempt. *
/// `attempt` — 1-based retry attempt number. * `prev_delay_ms` — the previous
/// computed delay, used only by `DecorrelatedJitter`; pass `None` on the
/// first retry (defaults `prev` to `base * 2^attempt` when absent).
pub fn calculate_delay(
    strategy: BackoffStrategy,
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    prev_delay_ms: Option<u64>,
    random: f64,
) -> u64 {
    debug_assert!((0.0..1.0).contains(&random));
    match strategy {
        BackoffStrategy::Exponential => exponential(attempt, base_delay_ms, max_delay_ms),
        BackoffStrategy::Linear => linear(attempt, base_delay_ms, max_delay_ms),
        BackoffStrategy::Fixed => base_delay_ms,
        BackoffStrategy::FullJitter => {
            let cap = exponential(attempt, base_delay_ms, max_delay_ms);
            (random * cap as f64).round() as u64
        }
        BackoffStrategy::FixedJitter => {
            base_delay_ms + (random * base_delay_ms as f64).round() as u64
        }
        BackoffStrategy::DecorrelatedJitter => {
            let prev = prev_delay_ms.unwrap_or_else(|| exponential(attempt, base_delay_ms, max_delay_ms));
            let hi = (prev.saturating_mul(3)) as f64;
            let lo = base_delay_ms as f64;
            let span = (hi - lo).max(0.0);
            let value = lo + random * span;
            (value.round() as u64).min(max_delay_ms)
        }
    }
}

fn exponential(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exp = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exp.min(max_delay_ms)
}

fn linear(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms.saturating_mul(u64::from(attempt) + 1).min(max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_growth() {
        assert_eq!(calculate_delay(BackoffStrategy::Exponential, 0, 1000, 60_000, None, 0.0), 1000);
        assert_eq!(calculate_delay(BackoffStrategy::Exponential, 1, 1000, 60_000, None, 0.0), 2000);
        assert_eq!(calculate_delay(BackoffStrategy::Exponential, 2, 1000, 60_000, None, 0.0), 4000);
    }

    #[test]
    fn exponential_caps_at_max() {
        assert_eq!(calculate_delay(BackoffStrategy::Exponential, 10, 1000, 60_000, None, 0.0), 60_000);
    }

    #[test]
    fn linear_growth() {
        assert_eq!(calculate_delay(BackoffStrategy::Linear, 0, 500, 60_000, None, 0.0), 500);
        assert_eq!(calculate_delay(BackoffStrategy::Linear, 1, 500, 60_000, None, 0.0), 1000);
        assert_eq!(calculate_delay(BackoffStrategy::Linear, 3, 500, 60_000, None, 0.0), 2000);
    }

    #[test]
    fn fixed_is_constant() {
        for attempt in 0..5 {
            assert_eq!(calculate_delay(BackoffStrategy::Fixed, attempt, 750, 60_000, None, 0.9), 750);
        }
    }

    #[test]
    fn full_jitter_bounded_by_exponential_cap() {
        let cap = exponential(2, 1000, 60_000);
        let d0 = calculate_delay(BackoffStrategy::FullJitter, 2, 1000, 60_000, None, 0.0);
        let d1 = calculate_delay(BackoffStrategy::FullJitter, 2, 1000, 60_000, None, 0.999);
        assert_eq!(d0, 0);
        assert!(d1 <= cap);
    }

    #[test]
    fn fixed_jitter_in_base_to_double_base_range() {
        let d_lo = calculate_delay(BackoffStrategy::FixedJitter, 0, 1000, 60_000, None, 0.0);
        let d_hi = calculate_delay(BackoffStrategy::FixedJitter, 0, 1000, 60_000, None, 0.999);
        assert_eq!(d_lo, 1000);
        assert!(d_hi >= 1000 && d_hi <= 2000);
    }

    #[test]
    fn decorrelated_jitter_respects_prev_and_cap() {
        let d = calculate_delay(BackoffStrategy::DecorrelatedJitter, 1, 1000, 5000, Some(2000), 1.0);
        assert!(d <= 5000);
        let d_default_prev = calculate_delay(BackoffStrategy::DecorrelatedJitter, 1, 1000, 60_000, None, 0.0);
        assert_eq!(d_default_prev, 1000);
    }

    #[test]
    fn never_overflows_on_high_attempt() {
        let d = calculate_delay(BackoffStrategy::Exponential, 200, 1000, 60_000, None, 0.0);
        assert_eq!(d, 60_000);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn exponential_stays_within_base_and_max(
                attempt in 0u32..40,
                base in 1u64..10_000,
                max in 1u64..100_000,
            ) {
                let max = max.max(base);
                let d = calculate_delay(BackoffStrategy::Exponential, attempt, base, max, None, 0.0);
                prop_assert!(d >= base);
                prop_assert!(d <= max);
            }

            #[test]
            fn linear_stays_within_base_and_max(
                attempt in 0u32..1000,
                base in 1u64..10_000,
                max in 1u64..100_000,
            ) {
                let max = max.max(base);
                let d = calculate_delay(BackoffStrategy::Linear, attempt, base, max, None, 0.0);
                prop_assert!(d >= base);
                prop_assert!(d <= max);
            }

            #[test]
            fn fixed_ignores_attempt_and_randomness(
                attempt in 0u32..1000,
                base in 0u64..100_000,
                max in 0u64..200_000,
                random in 0.0f64..1.0,
            ) {
                let d = calculate_delay(BackoffStrategy::Fixed, attempt, base, max, None, random);
                prop_assert_eq!(d, base);
            }

            #[test]
            fn full_jitter_never_exceeds_the_exponential_cap(
                attempt in 0u32..40,
                base in 1u64..10_000,
                max in 1u64..100_000,
                random in 0.0f64..1.0,
            ) {
                let max = max.max(base);
                let cap = exponential(attempt, base, max);
                let d = calculate_delay(BackoffStrategy::FullJitter, attempt, base, max, None, random);
                prop_assert!(d <= cap);
            }

            #[test]
            fn fixed_jitter_stays_within_base_and_double_base(
                attempt in 0u32..40,
                base in 1u64..10_000,
                max in 1u64..100_000,
                random in 0.0f64..1.0,
            ) {
                let max = max.max(base);
                let d = calculate_delay(BackoffStrategy::FixedJitter, attempt, base, max, None, random);
                prop_assert!(d >= base);
                prop_assert!(d <= base * 2);
            }

            #[test]
            fn decorrelated_jitter_never_exceeds_max(
                attempt in 0u32..40,
                base in 1u64..10_000,
                max in 1u64..100_000,
                prev in 0u64..200_000,
                random in 0.0f64..1.0,
            ) {
                let max = max.max(base);
                let d = calculate_delay(BackoffStrategy::DecorrelatedJitter, attempt, base, max, Some(prev), random);
                prop_assert!(d <= max);
            }
        }
    }
}
