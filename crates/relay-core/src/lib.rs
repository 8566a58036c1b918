//! # relay-core
//!
//! Data model shared by every component of the streaming reliability
//! runtime: session state and its invariants, the runtime `Event` family
//! consumers see, the recorded-event family the event store persists,
//! guardrail rule/violation types, the retry configuration and error
//! taxonomy, and the rich caller-facing error surface.
//!
//! This crate has no async runtime dependency and no I/O — it is the
//! vocabulary every other `relay-*` crate builds on.

#![deny(unsafe_code)]

pub mod constants;
pub mod error;
pub mod event;
pub mod guardrail;
pub mod health;
pub mod ids;
pub mod recorded;
pub mod retry;
pub mod session;

pub use error::{ErrorCode, RelayError};
pub use event::Event;
pub use guardrail::{GuardrailRule, RuleCheckContext, Severity, Violation};
pub use recorded::{Envelope, RecordedEvent};
pub use retry::{BackoffStrategy, ErrorCategory, RetryConfig, RetryReason};
pub use session::{SessionSnapshot, SessionState};
