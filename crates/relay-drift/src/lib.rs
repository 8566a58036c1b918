//! # relay-drift
//!
//! The drift detector: a stateless probe over `(content, latest_delta?)`
//! returning `{detected, types, confidence}`. Types are an open set; the
//! driver treats any positive detection within retry budget as a retry
//! trigger.

#![deny(unsafe_code)]

pub mod probe;

pub use probe::{detect, DriftResult, DriftType};
