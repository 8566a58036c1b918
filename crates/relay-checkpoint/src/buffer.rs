//! Append-only token accumulation.

/// An append-only buffer of emitted token deltas. Materializing the full
/// string is just borrowing `as_str()` — the buffer already *is* the
/// materialized content, so "materialize only when a rule or checkpoint
/// boundary demands it" simply means: don't clone it on every token, only
/// when you hand a snapshot to a collaborator that outlives the call.
#[derive(Clone, Debug, Default)]
pub struct TokenBuffer {
    content: String,
    token_count: u64,
}

impl TokenBuffer {
    /// A buffer with a starting capacity, avoiding the first few reallocations
    /// for typical response sizes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { content: String::with_capacity(capacity), token_count: 0 }
    }

    /// Seed the buffer from an existing checkpoint, e.g. when resuming.
    #[must_use]
    pub fn seeded_from(checkpoint: &str) -> Self {
        Self { content: checkpoint.to_owned(), token_count: 0 }
    }

    /// Append one token delta. Returns the new total token count.
    pub fn push(&mut self, delta: &str) -> u64 {
        self.content.push_str(delta);
        self.token_count += 1;
        self.token_count
    }

    /// Borrow the accumulated content without cloning.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Tokens appended so far (via `push`; seeding does not count).
    #[must_use]
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// Whether any content has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consume the buffer, returning the owned content.
    #[must_use]
    pub fn into_string(self) -> String {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_accumulates_in_order() {
        let mut buf = TokenBuffer::with_capacity(16);
        buf.push("Hello, ");
        buf.push("world");
        buf.push("!");
        assert_eq!(buf.as_str(), "Hello, world!");
        assert_eq!(buf.token_count(), 3);
    }

    #[test]
    fn seeded_buffer_does_not_count_the_seed_as_a_token() {
        let buf = TokenBuffer::seeded_from("t0-t1-");
        assert_eq!(buf.as_str(), "t0-t1-");
        assert_eq!(buf.token_count(), 0);
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let buf = TokenBuffer::with_capacity(0);
        assert!(buf.is_empty());
    }
}
