//! Default knobs named throughout

use std::time::Duration;

/// Default initial-token timeout: the first chunk must arrive within this
/// window or the attempt fails with `INITIAL_TOKEN_TIMEOUT`.
pub const DEFAULT_INITIAL_TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default inter-token timeout: each subsequent chunk must arrive within this
/// window, measured from the last emitted token.
pub const DEFAULT_INTER_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default streaming-guardrail cadence, in tokens.
pub const DEFAULT_GUARDRAIL_INTERVAL: u64 = 5;

/// Default drift-detection cadence, in tokens.
pub const DEFAULT_DRIFT_INTERVAL: u64 = 10;

/// Default checkpoint cadence, in tokens.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 10;

/// Default minimum overlap length accepted by `detect_overlap`.
pub const DEFAULT_MIN_OVERLAP: usize = 1;

/// Default maximum number of bytes buffered while searching for overlap.
pub const DEFAULT_MAX_OVERLAP: usize = 512;

/// Content size under which the guardrail engine's fast path runs
/// synchronously instead of deferring to the next cooperative yield.
pub const GUARDRAIL_FAST_PATH_THRESHOLD_BYTES: usize = 5 * 1024;

/// Default bound on the retry manager's error-history ring buffer.
pub const DEFAULT_MAX_ERROR_HISTORY: usize = 32;
