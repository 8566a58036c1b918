//! Built-in rule families: structural validity, zero-output detection, and
//! pattern families.

pub mod patterns;
pub mod structural;
pub mod zero_output;

use relay_core::guardrail::GuardrailRule;

/// The full built-in catalog: structural validity, zero-output, then the
/// pattern families.
#[must_use]
pub fn default_rules() -> Vec<GuardrailRule> {
    let mut rules = vec![
        structural::json_validity(),
        structural::markdown_validity(),
        structural::latex_validity(),
        zero_output::zero_output_detection(),
    ];
    rules.extend(patterns::default_pattern_rules());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_non_empty_and_uniquely_named() {
        let rules = default_rules();
        assert!(!rules.is_empty());
        let mut names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len(), "duplicate rule names in built-in catalog");
    }
}
