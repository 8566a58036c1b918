//! # relay-guardrails
//!
//! The guardrail engine: an ordered, named rule set
//! evaluated over streaming and final content, aggregating violations and
//! short-circuiting on `fatal`.

#![deny(unsafe_code)]

pub mod builtins;
pub mod engine;

pub use engine::{Evaluation, GuardrailEngine};
