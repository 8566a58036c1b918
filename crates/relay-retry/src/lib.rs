//! # relay-retry
//!
//! The error categorizer and retry manager. Pure decision logic
//! plus backoff math — the driver (`relay-runtime`) owns the actual
//! `tokio::time::sleep`.

#![deny(unsafe_code)]

pub mod backoff;
pub mod categorizer;
pub mod history;
pub mod manager;

pub use backoff::calculate_delay;
pub use categorizer::{categorize, ErrorHint};
pub use history::ErrorHistory;
pub use manager::{RetryDecision, RetryManager};
