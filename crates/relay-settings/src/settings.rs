use serde::{Deserialize, Serialize};

/// Token-count cadence for the streaming checks named in step 4: "Every `K_g`
/// tokens, run streaming guardrails... Every `K_d` tokens, run drift
/// detection... Every `K_c` tokens, snapshot `checkpoint = content`."
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntervalSettings {
    /// Tokens between streaming guardrail passes. Default `5`.
    pub guardrail_tokens: u32,
    /// Tokens between drift detector passes. Default `10`.
    pub drift_tokens: u32,
    /// Tokens between checkpoint snapshots. Default `10`.
    pub checkpoint_tokens: u32,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self { guardrail_tokens: 5, drift_tokens: 10, checkpoint_tokens: 10 }
    }
}

/// Ambient logging configuration consumed by `relay-logging`'s initializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing-subscriber` `EnvFilter` directive, e.g. `"info"` or
    /// `"relay_runtime=debug,info"`.
    pub level: String,
    /// Emit newline-delimited JSON instead of the human-readable formatter.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_owned(), json: false }
    }
}

/// Root ambient settings record, layered by [`crate::load`]/
/// [`crate::load_with_override`]. Everything here is an environment- tunable
/// default the driver falls back to when a caller's `RunOptions` leaves the
/// corresponding knob unset; it never overrides an explicit per-run value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Streaming guardrail/drift/checkpoint cadence.
    pub intervals: IntervalSettings,
    /// Whether to append to an event store when a run doesn't specify `record`
    /// explicitly.
    pub recording_enabled: bool,
    /// Default per-run timeout in milliseconds, used when `RunOptions` doesn't
    /// supply one.
    pub default_timeout_ms: u64,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            intervals: IntervalSettings::default(),
            recording_enabled: true,
            default_timeout_ms: 120_000,
            logging: LoggingSettings::default(),
        }
    }
}
