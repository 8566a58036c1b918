//! Layered ambient configuration for the streaming driver. Settings load
//! in three layers, lowest to highest priority:
//!
//! 1. [`RelaySettings::default()`], compiled into the binary.
//! 2. `RELAY_*`-prefixed environment variables.
//! 3. An explicit override `figment::Provider` passed by the caller,
//!    typically a test fixture or a one-off JSON blob.

mod settings;

pub use settings::{IntervalSettings, LoggingSettings, RelaySettings};

use figment::providers::{Env, Format, Json, Serialized};
use figment::{Figment, Provider};
use thiserror::Error;

/// Failure loading or parsing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `figment` failed to extract a [`RelaySettings`] from its merged providers
    /// — typically a malformed env var or override JSON.
    #[error("failed to load relay settings: {0}")]
    Figment(#[from] figment::Error),
}

/// Load settings from compiled defaults overlaid with `RELAY_*` environment
/// variables. No explicit override.
///
/// # Errors
///
/// Returns [`SettingsError::Figment`] if an env var can't be coerced into
/// its field's type.
pub fn load() -> Result<RelaySettings, SettingsError> {
    load_with_override::<Json>(None)
}

/// Load settings from compiled defaults, `RELAY_*` environment variables,
/// and finally `over`, which wins on any conflicting key. Pass a
/// `figment::providers::Json::string(..)` or similar to pin specific
/// values in tests without touching the process environment.
///
/// # Errors
///
/// Returns [`SettingsError::Figment`] if any layer fails to parse.
pub fn load_with_override<P: Provider>(over: Option<P>) -> Result<RelaySettings, SettingsError> {
    let mut figment = Figment::from(Serialized::defaults(RelaySettings::default()))
        .merge(Env::prefixed("RELAY_").split("__"));
    if let Some(over) = over {
        figment = figment.merge(over);
    }
    figment.extract().map_err(SettingsError::from)
}
