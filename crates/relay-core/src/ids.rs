//! Branded identifiers. Stream IDs double as event-store keys, so they carry
//! a constructor that enforces the path-safety rule the file adapter depends
//! on (`^[A-Za-z0-9_-]+$`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one logical stream (one session's worth of recorded
/// events). Stable for the lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

/// A `StreamId` was rejected because it contains characters outside
/// `[A-Za-z0-9_-]`.
#[derive(Debug, thiserror::Error)]
#[error("invalid stream id {0:?}: must match ^[A-Za-z0-9_-]+$")]
pub struct InvalidStreamId(pub String);

impl StreamId {
    /// Validate and wrap a stream id.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidStreamId> {
        let raw = raw.into();
        if raw.is_empty()
            || !raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(InvalidStreamId(raw));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh random stream id (UUIDv7, time-ordered).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_underscore_dash() {
        assert!(StreamId::new("abc_123-XYZ").is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(StreamId::new("../etc/passwd").is_err());
        assert!(StreamId::new("a/b").is_err());
        assert!(StreamId::new("").is_err());
    }

    #[test]
    fn rejects_whitespace() {
        assert!(StreamId::new("has space").is_err());
    }

    #[test]
    fn generate_is_valid() {
        let id = StreamId::generate();
        assert!(StreamId::new(id.as_str().to_owned()).is_ok());
    }
}
