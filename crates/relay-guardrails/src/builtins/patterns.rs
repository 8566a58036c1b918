//! Pattern-family rules: meta-commentary, excessive opening hedging, refusal,
//! instruction leakage, placeholder markers, format collapse, sentence-level
//! repetition, first-last duplicate.

use regex::Regex;

use relay_core::guardrail::{violation, GuardrailRule, Severity};

fn compiled(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).expect("built-in pattern is valid regex")).collect()
}

fn first_match(patterns: &[Regex], text: &str) -> Option<usize> {
    patterns.iter().find_map(|p| p.find(text).map(|m| m.start()))
}

/// All default pattern-family rules, in the order lists them.
#[must_use]
pub fn default_pattern_rules() -> Vec<GuardrailRule> {
    vec![
        meta_commentary(),
        excessive_opening_hedging(),
        refusal(),
        instruction_leakage(),
        placeholder_markers(),
        format_collapse(),
        sentence_repetition(),
        first_last_duplicate(),
    ]
}

/// Flags the model narrating its own process instead of producing the
/// requested content (e.g. "As an AI, I will now...").
#[must_use]
pub fn meta_commentary() -> GuardrailRule {
    let patterns = compiled(&[
        r"(?i)^as an ai\b",
        r"(?i)\bi('m| am) an ai (language model|assistant)\b",
        r"(?i)\blet me (now )?(explain|walk you through) what i('m| am) (doing|going to do)\b",
        r"(?i)\bi will now\b",
    ]);
    GuardrailRule::new(
        "builtin.pattern.meta-commentary",
        "Flags the model narrating its own process rather than producing content",
        Severity::Warning,
        true,
        true,
        move |ctx| {
            let text = ctx.delta.unwrap_or(ctx.content);
            first_match(&patterns, text)
                .map(|pos| violation("meta-commentary about the model's own process").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags long, repetitive hedging before any substantive content appears
/// (e.g. several consecutive "I should note that..." clauses).
#[must_use]
pub fn excessive_opening_hedging() -> GuardrailRule {
    let patterns = compiled(&[
        r"(?i)^(i should note that|it('s| is) (important|worth) (to note|noting) that|to clarify,?)\s*.{0,80}(i should note that|it('s| is) (important|worth) (to note|noting) that|to clarify,?)",
    ]);
    GuardrailRule::new(
        "builtin.pattern.excessive-opening-hedging",
        "Flags stacked hedging clauses before any substantive content",
        Severity::Warning,
        true,
        false,
        move |ctx| {
            first_match(&patterns, ctx.content)
                .map(|pos| violation("excessive hedging at the start of the response").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags an explicit refusal to perform the requested task.
#[must_use]
pub fn refusal() -> GuardrailRule {
    let patterns = compiled(&[
        r"(?i)\bi('m| am) (sorry,? )?(but )?i can('t|not)\b",
        r"(?i)\bi('m| am) unable to (help|assist|comply) with\b",
        r"(?i)\bi must decline\b",
        r"(?i)\bas a language model,? i (cannot|can't)\b",
    ]);
    GuardrailRule::new(
        "builtin.pattern.refusal",
        "Flags explicit refusals to perform the requested task",
        Severity::Error,
        true,
        true,
        move |ctx| {
            let text = ctx.delta.unwrap_or(ctx.content);
            first_match(&patterns, text)
                .map(|pos| violation("response contains an explicit refusal").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags leaked system/developer instruction text appearing verbatim in
/// output (e.g. "You are a helpful assistant" boilerplate).
#[must_use]
pub fn instruction_leakage() -> GuardrailRule {
    let patterns = compiled(&[
        r"(?i)\byou are a helpful (ai )?assistant\b",
        r"(?i)\b(system|developer) prompt:\s",
        r"(?i)\b<\/?(system|instructions)>",
    ]);
    GuardrailRule::new(
        "builtin.pattern.instruction-leakage",
        "Flags system/developer prompt text leaking into output",
        Severity::Error,
        true,
        true,
        move |ctx| {
            let text = ctx.delta.unwrap_or(ctx.content);
            first_match(&patterns, text)
                .map(|pos| violation("leaked instruction/system-prompt text").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags unresolved placeholder markers (`TODO`, `[INSERT...]`, `<FILL IN>`,
/// `{{placeholder}}`) in completed content.
#[must_use]
pub fn placeholder_markers() -> GuardrailRule {
    let patterns = compiled(&[
        r"(?i)\[(insert|fill in|todo|placeholder)[^\]]*\]",
        r"(?i)<(fill in|todo|placeholder)[^>]*>",
        r"\{\{\s*[\w.]+\s*\}\}",
        r"(?i)\bTODO:",
    ]);
    GuardrailRule::new(
        "builtin.pattern.placeholder-markers",
        "Flags unresolved placeholder markers in completed content",
        Severity::Error,
        true,
        false,
        move |ctx| {
            first_match(&patterns, ctx.content)
                .map(|pos| violation("unresolved placeholder marker in output").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags a collapse into a single repeated character or symbol run (e.g. a
/// stream that degenerates into `......` or `aaaaaaaa`).
#[must_use]
pub fn format_collapse() -> GuardrailRule {
    let patterns = compiled(&[r"(.)\1{19,}"]);
    GuardrailRule::new(
        "builtin.pattern.format-collapse",
        "Flags degeneration into a long run of one repeated character",
        Severity::Error,
        true,
        true,
        move |ctx| {
            let text = ctx.delta.unwrap_or(ctx.content);
            first_match(&patterns, text)
                .map(|pos| violation("output collapsed into a repeated-character run").position(pos))
                .into_iter()
                .collect()
        },
    )
}

/// Flags the same sentence (trimmed, case-folded) appearing three or more
/// times in the completed content.
#[must_use]
pub fn sentence_repetition() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.pattern.sentence-repetition",
        "Flags a sentence repeated three or more times",
        Severity::Warning,
        true,
        false,
        |ctx| {
            use std::collections::HashMap;
            let mut counts: HashMap<String, usize> = HashMap::new();
            for sentence in ctx.content.split(['.', '!', '?']) {
                let normalized = sentence.trim().to_lowercase();
                if normalized.len() < 8 {
                    continue;
                }
                *counts.entry(normalized).or_insert(0) += 1;
            }
            counts
                .into_iter()
                .find(|(_, count)| *count >= 3)
                .map(|(sentence, count)| {
                    violation(format!("sentence repeated {count} times: {sentence:.60}"))
                })
                .into_iter()
                .collect()
        },
    )
}

/// Flags the last sentence being a near-duplicate of the first, suggestive of
/// the model looping back to its own opening.
#[must_use]
pub fn first_last_duplicate() -> GuardrailRule {
    GuardrailRule::new(
        "builtin.pattern.first-last-duplicate",
        "Flags the closing sentence duplicating the opening sentence",
        Severity::Warning,
        true,
        false,
        |ctx| {
            let sentences: Vec<&str> = ctx
                .content
                .split(['.', '!', '?'])
                .map(str::trim)
                .filter(|s| s.len() >= 8)
                .collect();
            if sentences.len() < 2 {
                return Vec::new();
            }
            let first = sentences[0].to_lowercase();
            let last = sentences[sentences.len() - 1].to_lowercase();
            if first == last {
                vec![violation("closing sentence duplicates the opening sentence")]
            } else {
                Vec::new()
            }
        },
    )
}

trait ViolationBuilderExt {
    fn position(self, pos: usize) -> relay_core::guardrail::Violation;
}

impl ViolationBuilderExt for relay_core::guardrail::Violation {
    fn position(mut self, pos: usize) -> relay_core::guardrail::Violation {
        self.position = Some(pos);
        self
    }
}
