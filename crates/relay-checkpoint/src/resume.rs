//! Deduplication-on-resume state machine. When a fallback/retry resumes mid-
//! response from a checkpoint, the new attempt's first tokens may re-emit
//! content already present in the checkpoint. Rather than waiting for the
//! whole continuation before deciding, `ResumeBuffer` buffers just enough of
//! it to make the call: either an overlap is found and only the non-
//! overlapping suffix is released, or the buffer grows past `max_overlap`
//! with no match and everything buffered so far is released unmodified.

use crate::overlap::{detect_overlap, OverlapOptions, OverlapResult};

/// What a `ResumeBuffer::push` call yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Still buffering; not enough has arrived to decide either way.
    Buffering,
    /// Overlap resolved. `emit` is the content callers should now treat as newly
    /// streamed (already deduplicated against the checkpoint). Once returned, the
    /// buffer is drained and every subsequent `push` passes its delta straight
    /// through as `Emit`.
    Resolved { emit: String },
    /// The buffer exceeded `max_overlap` without finding an overlap of at least
    /// `min_overlap`; `emit` is everything buffered, released as-is.
    Flushed { emit: String },
}

/// Buffers a resumed stream's leading tokens until overlap against the prior
/// checkpoint can be resolved.
#[derive(Clone, Debug)]
pub struct ResumeBuffer {
    checkpoint: String,
    options: OverlapOptions,
    buffer: String,
    resolved: bool,
}

impl ResumeBuffer {
    /// Start buffering a resume against `checkpoint`.
    #[must_use]
    pub fn new(checkpoint: impl Into<String>, options: OverlapOptions) -> Self {
        Self { checkpoint: checkpoint.into(), options, buffer: String::new(), resolved: false }
    }

    /// Feed one delta from the resumed stream.
    pub fn push(&mut self, delta: &str) -> ResumeOutcome {
        if self.resolved {
            return ResumeOutcome::Resolved { emit: delta.to_owned() };
        }

        self.buffer.push_str(delta);

        let result: OverlapResult = detect_overlap(&self.checkpoint, &self.buffer, self.options);
        if result.found() {
            self.resolved = true;
            let emit = self.buffer[result.original_byte_offset..].to_owned();
            self.buffer.clear();
            return ResumeOutcome::Resolved { emit };
        }

        if self.buffer.len() >= self.options.max_overlap {
            self.resolved = true;
            let emit = std::mem::take(&mut self.buffer);
            return ResumeOutcome::Flushed { emit };
        }

        ResumeOutcome::Buffering
    }

    /// Flush whatever remains buffered when the stream ends while still
    /// undecided. Returns `None` once resolved, since all subsequent content is
    /// passed straight through by `push` and there is nothing left to flush.
    pub fn finalize_on_stream_end(&mut self) -> Option<String> {
        if self.resolved || self.buffer.is_empty() {
            return None;
        }
        self.resolved = true;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Whether overlap has been decided (found, or given up on).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}
