use serde::{Deserialize, Serialize};

/// A log severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed entry/exit tracing.
    Trace,
    /// Intermediate values and decisions (state transitions, retries).
    Debug,
    /// Outcomes and summaries.
    Info,
    /// Non-fatal issues: a guardrail violation, a drift flag.
    Warn,
    /// Fatal errors: retry budget exhaustion, fallback exhaustion.
    Error,
}

impl LogLevel {
    /// Map from a `tracing::Level`.
    #[must_use]
    pub fn from_tracing(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }

    /// Parse case-insensitively, defaulting to `Info` for unrecognized input
    /// rather than failing — this mirrors how an `EnvFilter` directive degrades,
    /// since a misconfigured log level shouldn't stop a process from starting.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}
