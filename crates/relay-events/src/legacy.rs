//! The legacy-callback sink: translates a subset of emissions into plain
//! user callbacks (`on_start`, `on_complete`, `on_error`, `on_retry`,
//! `on_fallback`, `on_checkpoint`, `on_resume`, `on_abort`, `on_timeout`,
//! `on_violation`, `on_drift`, `on_tool_call`).

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::catalog::{ObservabilityEnvelope, ObservabilityEvent};
use crate::dispatcher::Sink;

type Callback0 = Box<dyn Fn() + Send + Sync>;
type CallbackStr = Box<dyn Fn(&str) + Send + Sync>;

/// User-supplied legacy callbacks, as named on a `Run invocation`
/// configuration record. Every field is optional; unset callbacks are simply
/// not invoked.
#[derive(Default)]
pub struct LegacyCallbacks {
    on_start: Option<Callback0>,
    on_complete: Option<Callback0>,
    on_error: Option<Box<dyn Fn(&str, &str, bool) + Send + Sync>>,
    on_retry: Option<Box<dyn Fn(u32, &str, u64) + Send + Sync>>,
    on_fallback: Option<Box<dyn Fn(u32) + Send + Sync>>,
    on_checkpoint: Option<Box<dyn Fn(u64) + Send + Sync>>,
    on_resume: Option<Box<dyn Fn(usize) + Send + Sync>>,
    on_abort: Option<Callback0>,
    on_timeout: Option<CallbackStr>,
    on_violation: Option<Box<dyn Fn(&str, &str, bool) + Send + Sync>>,
    on_drift: Option<Box<dyn Fn(&[String], f64) + Send + Sync>>,
    on_tool_call: Option<Box<dyn Fn(&str, &str, &serde_json::Value) + Send + Sync>>,
}

impl LegacyCallbacks {
    /// Start from an empty callback set; `with_*` builders attach each one.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_error(mut self, f: impl Fn(&str, &str, bool) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_retry(mut self, f: impl Fn(u32, &str, u64) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_fallback(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_fallback = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_checkpoint(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_checkpoint = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_resume(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_resume = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_abort(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_abort = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_timeout(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_violation(mut self, f: impl Fn(&str, &str, bool) + Send + Sync + 'static) -> Self {
        self.on_violation = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_drift(mut self, f: impl Fn(&[String], f64) + Send + Sync + 'static) -> Self {
        self.on_drift = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_tool_call(mut self, f: impl Fn(&str, &str, &serde_json::Value) + Send + Sync + 'static) -> Self {
        self.on_tool_call = Some(Box::new(f));
        self
    }
}

/// Run `f`, swallowing and logging a panic rather than letting it unwind into
/// the dispatcher's fan-out loop.
fn fail_open(which: &str, f: impl FnOnce() + std::panic::UnwindSafe) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!(callback = which, "legacy callback panicked (fail-open)");
    }
}

impl Sink for LegacyCallbacks {
    fn on_event(&self, envelope: &ObservabilityEnvelope) {
        match &envelope.event {
            ObservabilityEvent::SessionStart => {
                if let Some(f) = &self.on_start {
                    fail_open("on_start", || f());
                }
            }
            ObservabilityEvent::Complete => {
                if let Some(f) = &self.on_complete {
                    fail_open("on_complete", || f());
                }
            }
            ObservabilityEvent::Error { code, recoverable } => {
                if let Some(f) = &self.on_error {
                    fail_open("on_error", || f(code, code, *recoverable));
                }
            }
            ObservabilityEvent::RetryAttempt { attempt, reason, delay_ms } => {
                if let Some(f) = &self.on_retry {
                    fail_open("on_retry", || f(*attempt, reason, *delay_ms));
                }
            }
            ObservabilityEvent::FallbackStart { fallback_index } => {
                if let Some(f) = &self.on_fallback {
                    fail_open("on_fallback", || f(*fallback_index));
                }
            }
            ObservabilityEvent::CheckpointSaved { at } => {
                if let Some(f) = &self.on_checkpoint {
                    fail_open("on_checkpoint", || f(*at));
                }
            }
            ObservabilityEvent::ResumeStart { checkpoint_len } => {
                if let Some(f) = &self.on_resume {
                    fail_open("on_resume", || f(*checkpoint_len));
                }
            }
            ObservabilityEvent::AbortCompleted => {
                if let Some(f) = &self.on_abort {
                    fail_open("on_abort", || f());
                }
            }
            ObservabilityEvent::TimeoutTriggered { kind } => {
                if let Some(f) = &self.on_timeout {
                    fail_open("on_timeout", || f(kind));
                }
            }
            ObservabilityEvent::GuardrailViolation { rule_id, severity, recoverable } => {
                if let Some(f) = &self.on_violation {
                    fail_open("on_violation", || f(rule_id, severity, *recoverable));
                }
            }
            ObservabilityEvent::DriftDetected { types, confidence } => {
                if let Some(f) = &self.on_drift {
                    fail_open("on_drift", || f(types, *confidence));
                }
            }
            ObservabilityEvent::ToolRequested { id, name, arguments } => {
                if let Some(f) = &self.on_tool_call {
                    fail_open("on_tool_call", || f(name, id, arguments));
                }
            }
            ObservabilityEvent::AttemptStart { .. }
            | ObservabilityEvent::AbortRequested
            | ObservabilityEvent::ToolResult { .. }
            | ObservabilityEvent::ToolError { .. }
            | ObservabilityEvent::ToolCompleted { .. } => {}
        }
    }
}
