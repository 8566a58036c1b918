//! The error shape a stream factory's chunk stream yields on failure.

use relay_retry::categorizer::ErrorHint;

/// One chunk-stream failure.
#[derive(Clone, Debug)]
pub struct StreamError {
    /// Human-readable cause, fed to [`relay_retry::categorize`] and surfaced on
    /// the terminal [`relay_core::RelayError`] if the session ultimately fails.
    pub message: String,
    /// An optional hint overriding message-sniffing classification.
    pub hint: Option<ErrorHint>,
    /// A short type tag (e.g. `"ssl"`, `"dns"`) matched against
    /// `RetryConfig::error_type_delays`.
    pub error_type: Option<String>,
}

impl StreamError {
    /// Build from a bare message with no classification hint.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), hint: None, error_type: None }
    }

    /// Attach a classification hint.
    #[must_use]
    pub fn with_hint(mut self, hint: ErrorHint) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Attach a network error-type tag.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StreamError {}
