//! Overlap detection between a checkpoint and a continuation. Given
//! `checkpoint` (already accumulated) and `continuation` (new tokens from a
//! resumed stream), find the longest `L` such that `suffix(checkpoint, L) ==
//! prefix(continuation, L)`, searching from longest to shortest so the common
//! case (a clean resume with a large overlap) terminates in one comparison.

use relay_core::constants::{DEFAULT_MAX_OVERLAP, DEFAULT_MIN_OVERLAP};
use serde::{Deserialize, Serialize};

/// Controls for the overlap search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapOptions {
    /// Shortest overlap worth reporting; below this, treat as no match.
    pub min_overlap: usize,
    /// Longest overlap to search for / longest continuation prefix to buffer
    /// before giving up and flushing.
    pub max_overlap: usize,
    /// When `false`, compare case-insensitively.
    pub case_sensitive: bool,
    /// When `true`, collapse runs of whitespace to a single space before
    /// comparing.
    pub normalize_whitespace: bool,
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self {
            min_overlap: DEFAULT_MIN_OVERLAP,
            max_overlap: DEFAULT_MAX_OVERLAP,
            case_sensitive: true,
            normalize_whitespace: false,
        }
    }
}

/// Result of one overlap search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlapResult {
    /// Length of the matched overlap, in normalized characters. Zero means no
    /// overlap of at least `min_overlap` was found.
    pub overlap_len: usize,
    /// Byte offset into the *original* `continuation` where the non-overlapping
    /// suffix begins.
    pub original_byte_offset: usize,
}

impl OverlapResult {
    /// Whether any overlap was found.
    #[must_use]
    pub fn found(&self) -> bool {
        self.overlap_len > 0
    }
}

/// Normalize `s` per `opts`, returning the normalized string alongside a
/// parallel vector mapping each normalized `char` index to the original byte
/// offset at which that normalized character's source run begins.
/// `positions[normalized.chars().count()]` (one past the end) is always
/// `s.len()`, so callers can index one past the last matched char to recover
/// the original offset immediately after the match. Zero-width characters are
/// explicitly out of scope, "do not guess") — they are neither collapsed nor
/// specially positioned, so a zero-width character adjacent to a collapsed
/// whitespace run may map to an offset a caller doesn't expect.
fn normalize_with_positions(s: &str, opts: OverlapOptions) -> (String, Vec<usize>) {
    let mut normalized = String::with_capacity(s.len());
    let mut positions = Vec::with_capacity(s.len() + 1);
    let mut prev_was_space = false;

    for (byte_offset, ch) in s.char_indices() {
        let is_space = opts.normalize_whitespace && ch.is_whitespace();
        if is_space {
            if prev_was_space {
                // Collapsed into the previous run's normalized char; no new normalized
                // character or position entry.
                continue;
            }
            positions.push(byte_offset);
            normalized.push(' ');
            prev_was_space = true;
            continue;
        }
        prev_was_space = false;
        positions.push(byte_offset);
        if opts.case_sensitive {
            normalized.push(ch);
        } else {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
        }
    }
    positions.push(s.len());
    (normalized, positions)
}

/// Find the longest suffix-of-`checkpoint` / prefix-of-`continuation`
/// overlap, searching from `min(max_overlap, |continuation|)` down to
/// `min_overlap`.
#[must_use]
pub fn detect_overlap(checkpoint: &str, continuation: &str, opts: OverlapOptions) -> OverlapResult {
    let (norm_checkpoint, _checkpoint_positions) = normalize_with_positions(checkpoint, opts);
    let (norm_continuation, continuation_positions) = normalize_with_positions(continuation, opts);

    let checkpoint_chars: Vec<char> = norm_checkpoint.chars().collect();
    let continuation_chars: Vec<char> = norm_continuation.chars().collect();

    let upper = opts.max_overlap.min(continuation_chars.len()).min(checkpoint_chars.len());

    for l in (opts.min_overlap..=upper).rev() {
        if l == 0 {
            continue;
        }
        let suffix = &checkpoint_chars[checkpoint_chars.len() - l..];
        let prefix = &continuation_chars[..l];
        if suffix == prefix {
            let original_byte_offset = continuation_positions.get(l).copied().unwrap_or(continuation.len());
            return OverlapResult { overlap_len: l, original_byte_offset };
        }
    }

    OverlapResult { overlap_len: 0, original_byte_offset: 0 }
}

/// Apply a detected overlap to `continuation`, returning the deduplicated
/// suffix.
#[must_use]
pub fn deduplicated_suffix<'a>(continuation: &'a str, result: &OverlapResult) -> &'a str {
    &continuation[result.original_byte_offset..]
}
