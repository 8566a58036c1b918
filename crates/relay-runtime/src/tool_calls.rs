//! Tool-call lifecycle tracking.
//! `relay_adapters::detect_tool_call`/`detect_tool_result` classify one
//! `message` payload in isolation; this module is the small piece of state
//! translating a detection into a correlated request/result pair.

use std::collections::HashMap;

use relay_adapters::{detect_tool_call, detect_tool_result, DetectedToolResult};
use relay_events::ObservabilityEvent;

struct PendingCall {
    name: String,
}

/// Tracks outstanding tool calls by id so a `tool_result` arriving for an
/// unknown or already-completed id is silently ignored rather than emitting a
/// dangling `TOOL_COMPLETED`.
#[derive(Default)]
pub struct ToolCallTracker {
    pending: HashMap<String, PendingCall>,
}

impl ToolCallTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect one `message`-role event payload, returning the observability
    /// events it produces, in emission order.
    pub fn observe(&mut self, payload: &str, synthetic_ts: u64) -> Vec<ObservabilityEvent> {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
            return Vec::new();
        };

        let mut out = Vec::new();

        for call in detect_tool_call(&value, synthetic_ts) {
            let _ = self.pending.insert(call.id.clone(), PendingCall { name: call.name.clone() });
            out.push(ObservabilityEvent::ToolRequested { id: call.id, name: call.name, arguments: call.arguments });
        }

        if let Some(result) = detect_tool_result(&value) {
            let id = match &result {
                DetectedToolResult::Ok { id, .. } | DetectedToolResult::Err { id, .. } => id.clone(),
            };
            if self.pending.remove(&id).is_some() {
                match result {
                    DetectedToolResult::Ok { id, value } => out.push(ObservabilityEvent::ToolResult { id, value }),
                    DetectedToolResult::Err { id, error } => out.push(ObservabilityEvent::ToolError { id, error }),
                }
                out.push(ObservabilityEvent::ToolCompleted { id });
            }
        }

        out
    }

    /// Tool-call ids still awaiting a result.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Name of a still-pending call, for diagnostics.
    #[must_use]
    pub fn pending_name(&self, id: &str) -> Option<&str> {
        self.pending.get(id).map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_then_result_completes_the_pair() {
        let mut tracker = ToolCallTracker::new();
        let requested = tracker.observe(r#"{"type":"tool_call","name":"bash","id":"tc-1","arguments":{"cmd":"ls"}}"#, 0);
        assert_eq!(requested.len(), 1);
        assert!(matches!(&requested[0], ObservabilityEvent::ToolRequested { id, .. } if id == "tc-1"));
        assert_eq!(tracker.pending_count(), 1);

        let completed = tracker.observe(r#"{"type":"tool_result","id":"tc-1","result":{"ok":true}}"#, 1);
        assert_eq!(completed.len(), 2);
        assert!(matches!(&completed[0], ObservabilityEvent::ToolResult { id, .. } if id == "tc-1"));
        assert!(matches!(&completed[1], ObservabilityEvent::ToolCompleted { id } if id == "tc-1"));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn result_for_unknown_id_is_ignored() {
        let mut tracker = ToolCallTracker::new();
        let out = tracker.observe(r#"{"type":"tool_result","id":"ghost","result":{}}"#, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn duplicate_result_for_already_completed_id_is_ignored() {
        let mut tracker = ToolCallTracker::new();
        let _ = tracker.observe(r#"{"type":"tool_call","name":"bash","id":"tc-1"}"#, 0);
        let first = tracker.observe(r#"{"type":"tool_result","id":"tc-1","result":{}}"#, 1);
        assert_eq!(first.len(), 2);
        let second = tracker.observe(r#"{"type":"tool_result","id":"tc-1","result":{}}"#, 2);
        assert!(second.is_empty());
    }

    #[test]
    fn malformed_json_payload_is_ignored() {
        let mut tracker = ToolCallTracker::new();
        let out = tracker.observe("not json", 0);
        assert!(out.is_empty());
    }

    #[test]
    fn error_result_maps_to_tool_error() {
        let mut tracker = ToolCallTracker::new();
        let _ = tracker.observe(r#"{"type":"tool_call","name":"bash","id":"tc-2"}"#, 0);
        let out = tracker.observe(r#"{"type":"tool_result","id":"tc-2","error":"boom"}"#, 1);
        assert!(matches!(&out[0], ObservabilityEvent::ToolError { id, error } if id == "tc-2" && error == "boom"));
    }
}
