//! The drift probe itself.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A detected drift category. Open set: `Other(String)` lets callers (and
/// future heuristics) report a kind this crate doesn't yet name, without
/// changing the wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DriftType {
    /// The same sentence or phrase recurring well beyond normal prose.
    Repetition,
    /// The model narrating its own process instead of answering.
    MetaCommentary,
    /// Vocabulary overlap between the start and end of the content has collapsed,
    /// suggesting the response wandered off-topic.
    TopicDrift,
    /// Structured formatting present early in the content (headers, lists, code
    /// fences) disappears later on.
    FormatLoss,
    /// A heuristic not covered by the named variants.
    Other(String),
}

/// Result of one drift probe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    /// Whether any drift type was detected.
    pub detected: bool,
    /// All detected types, in check order.
    pub types: Vec<DriftType>,
    /// A confidence estimate in `[0.0, 1.0]`, the max across detected signals.
    pub confidence: f64,
}

struct Signal {
    kind: DriftType,
    confidence: f64,
}

fn meta_commentary_patterns() -> Vec<Regex> {
    [
        r"(?i)^as an ai\b",
        r"(?i)\bi('m| am) an ai (language model|assistant)\b",
        r"(?i)\bi will now (explain|walk you through)\b",
        r"(?i)\blet me (explain|describe) what i('m| am) doing\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("built-in drift pattern is valid regex"))
    .collect()
}

fn check_meta_commentary(text: &str) -> Option<Signal> {
    let patterns = meta_commentary_patterns();
    if patterns.iter().any(|p| p.is_match(text)) {
        Some(Signal { kind: DriftType::MetaCommentary, confidence: 0.7 })
    } else {
        None
    }
}

/// Repetition: any normalized sentence (8+ chars) occurring 3+ times.
fn check_repetition(content: &str) -> Option<Signal> {
    use std::collections::HashMap;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sentence in content.split(['.', '!', '?']) {
        let normalized: String = sentence.trim().to_lowercase();
        if normalized.len() < 8 {
            continue;
        }
        *counts.entry(normalized).or_insert(0) += 1;
    }
    let max_count = counts.values().copied().max().unwrap_or(0);
    if max_count >= 3 {
        let confidence = (f64::from(u32::try_from(max_count).unwrap_or(u32::MAX)) / 10.0).min(1.0);
        Some(Signal { kind: DriftType::Repetition, confidence: confidence.max(0.5) })
    } else {
        None
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// Topic drift: vocabulary overlap (Jaccard) between the first and second
/// half of the content falls below a threshold. Requires enough content on
/// both halves to be meaningful.
fn check_topic_drift(content: &str) -> Option<Signal> {
    let mid = content.len() / 2;
    if mid < 40 {
        return None;
    }
    let (first_half, second_half) = content.split_at(mid);
    let first_words = words(first_half);
    let second_words = words(second_half);
    if first_words.len() < 5 || second_words.len() < 5 {
        return None;
    }
    let intersection = first_words.intersection(&second_words).count();
    let union = first_words.union(&second_words).count();
    if union == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let jaccard = intersection as f64 / union as f64;
    if jaccard < 0.05 {
        Some(Signal { kind: DriftType::TopicDrift, confidence: 1.0 - jaccard })
    } else {
        None
    }
}

fn has_structure(text: &str) -> bool {
    text.lines().any(|l| {
        let t = l.trim_start();
        t.starts_with('#') || t.starts_with("- ") || t.starts_with("* ") || t.starts_with("```")
    })
}

/// Format loss: the first half of the content uses Markdown structure
/// (headers/lists/fences) but the second half drops it entirely.
fn check_format_loss(content: &str) -> Option<Signal> {
    let mid = content.len() / 2;
    if mid < 40 {
        return None;
    }
    let (first_half, second_half) = content.split_at(mid);
    if has_structure(first_half) && !has_structure(second_half) {
        Some(Signal { kind: DriftType::FormatLoss, confidence: 0.6 })
    } else {
        None
    }
}

/// Probe `(content, latest_delta)` for drift. `latest_delta` is reserved for
/// future streaming-local heuristics; checks currently run against the fully
/// materialized `content`, since drift is a whole-document property.
#[must_use]
pub fn detect(content: &str, latest_delta: Option<&str>) -> DriftResult {
    let probe_text = latest_delta.unwrap_or(content);
    let mut signals = Vec::new();
    signals.extend(check_meta_commentary(probe_text));
    signals.extend(check_repetition(content));
    signals.extend(check_topic_drift(content));
    signals.extend(check_format_loss(content));

    let confidence = signals.iter().map(|s| s.confidence).fold(0.0_f64, f64::max);
    let types = signals.into_iter().map(|s| s.kind).collect();

    DriftResult { detected: confidence > 0.0, types, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_content_has_no_drift() {
        let result = detect("The quick brown fox jumps over the lazy dog in the park.", None);
        assert!(!result.detected);
        assert!(result.types.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn repeated_sentence_detected() {
        let content = "This exact same sentence repeats. This exact same sentence repeats. This exact same sentence repeats.";
        let result = detect(content, None);
        assert!(result.detected);
        assert!(result.types.contains(&DriftType::Repetition));
    }

    #[test]
    fn meta_commentary_in_delta_detected() {
        let result = detect("some content", Some("As an AI, I will now describe the weather."));
        assert!(result.detected);
        assert!(result.types.contains(&DriftType::MetaCommentary));
    }

    #[test]
    fn topic_drift_detected_on_disjoint_halves() {
        let first = "apples bananas oranges grapes melons pineapples strawberries blueberries raspberries ".repeat(3);
        let second = "quantum entanglement gravity relativity thermodynamics electromagnetism photons neutrinos bosons ".repeat(3);
        let content = format!("{first}{second}");
        let result = detect(&content, None);
        assert!(result.types.contains(&DriftType::TopicDrift));
    }

    #[test]
    fn format_loss_detected_when_structure_disappears() {
        let first = "# Heading\n- item one\n- item two\n```code```\n".repeat(4);
        let second = "just plain unstructured prose with no markers at all repeated ".repeat(6);
        let content = format!("{first}{second}");
        let result = detect(&content, None);
        assert!(result.types.contains(&DriftType::FormatLoss));
    }

    #[test]
    fn short_content_never_triggers_half_based_checks() {
        let result = detect("short", None);
        assert!(!result.types.contains(&DriftType::TopicDrift));
        assert!(!result.types.contains(&DriftType::FormatLoss));
    }

    #[test]
    fn confidence_is_the_max_across_signals() {
        let content = "This exact same sentence repeats. This exact same sentence repeats. This exact same sentence repeats.";
        let result = detect(content, Some("As an AI, I will now summarize."));
        assert!(result.types.len() >= 2);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn other_variant_serializes_with_custom_tag() {
        let v = DriftType::Other("custom_signal".to_owned());
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("custom_signal"));
    }
}
