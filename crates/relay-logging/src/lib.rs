//! Structured logging initialization. Every session-scoped operation runs
//! inside a `tracing::info_span!` carrying `stream_id`.

#![deny(unsafe_code)]

mod level;

pub use level::LogLevel;

use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber for a long-running process (a
/// server or CLI host embedding the driver). `filter_directive` is an
/// `EnvFilter` directive such as `"info"` or `"relay_runtime=debug,warn"`;
/// pass the value loaded from
/// `relay_settings::RelaySettings::logging::level`. When `json` is true,
/// emits newline-delimited JSON instead of the human-readable formatter.
/// Calling this twice in the same process is a logic error in the embedding
/// binary, not something this crate guards against — it mirrors
/// `tracing_subscriber`'s own `set_global_default` semantics.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init(filter_directive: &str, json: bool) {
    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_current_span(true)).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Open the `tracing::info_span!` every session-scoped operation runs inside,
/// carrying the stream identifier named in Callers `.enter()` or
/// `.in_scope()` the returned span around a run's driver loop.
#[must_use]
pub fn session_span(stream_id: &str) -> Span {
    tracing::info_span!("relay_session", stream_id = %stream_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_span_is_not_disabled() {
        let span = session_span("stream-1");
        assert!(!span.is_disabled());
    }

    #[test]
    fn malformed_filter_directive_falls_back_to_info() {
        // `init` panics on a second call within the same test binary's global
        // subscriber, so this only checks the filter parsing path doesn't panic on
        // bad input.
        let filter = EnvFilter::try_new("not a valid directive!!").unwrap_or_else(|_| EnvFilter::new("info"));
        assert_eq!(filter.to_string(), "info");
    }
}
