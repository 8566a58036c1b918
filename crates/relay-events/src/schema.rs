//! The dispatcher's fixed schema map: event type -> field name -> required.
//! Checked only in development — `Dispatcher::strict_schema` gates the cost
//! out of the hot path in release builds. The catalog is closed and already
//! well-typed by `ObservabilityEvent` itself, so this mostly guards against
//! the schema table drifting out of sync with the enum as both evolve, not
//! against malformed external input.

use crate::catalog::ObservabilityEnvelope;

/// One declared field in an event type's schema.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    /// Field name as it appears in the serialized payload.
    pub name: &'static str,
    /// Whether the dispatcher must see this field to accept the event.
    pub required: bool,
}

const fn field(name: &'static str, required: bool) -> FieldSpec {
    FieldSpec { name, required }
}

/// Declared fields for `event_type`, beyond the envelope's own `{type, ts,
/// streamId, context}`. `None` means the type isn't in the catalog at all.
fn schema_for(event_type: &str) -> Option<&'static [FieldSpec]> {
    Some(match event_type {
        "SESSION_START" | "ABORT_REQUESTED" | "ABORT_COMPLETED" | "COMPLETE" => &[],
        "ATTEMPT_START" => &[field("attempt", true), field("fallback_index", true)],
        "RETRY_ATTEMPT" => &[field("attempt", true), field("reason", true), field("delay_ms", true)],
        "FALLBACK_START" => &[field("fallback_index", true)],
        "RESUME_START" => &[field("checkpoint_len", true)],
        "TIMEOUT_TRIGGERED" => &[field("kind", true)],
        "CHECKPOINT_SAVED" => &[field("at", true)],
        "GUARDRAIL_VIOLATION" => &[field("rule_id", true), field("severity", true), field("recoverable", true)],
        "DRIFT_DETECTED" => &[field("types", true), field("confidence", true)],
        "TOOL_REQUESTED" => &[field("id", true), field("name", true), field("arguments", true)],
        "TOOL_RESULT" => &[field("id", true), field("value", true)],
        "TOOL_ERROR" => &[field("id", true), field("error", true)],
        "TOOL_COMPLETED" => &[field("id", true)],
        "ERROR" => &[field("code", true), field("recoverable", true)],
        _ => return None,
    })
}

/// Validate `envelope.event`'s serialized payload against its schema entry. #
/// Errors Returns an error message if the event type isn't cataloged, doesn't
/// serialize to a JSON object, or is missing a required field.
pub fn validate(envelope: &ObservabilityEnvelope) -> Result<(), String> {
    let event_type = envelope.event.event_type();
    let Some(fields) = schema_for(event_type) else {
        return Err(format!("event type {event_type} is not in the schema catalog"));
    };

    let value = serde_json::to_value(&envelope.event).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| format!("event type {event_type} did not serialize to an object"))?;

    for spec in fields {
        if spec.required && !object.contains_key(spec.name) {
            return Err(format!("event type {event_type} missing required field {}", spec.name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObservabilityEvent;
    use relay_core::ids::StreamId;

    fn envelope(event: ObservabilityEvent) -> ObservabilityEnvelope {
        ObservabilityEnvelope { ts: 0, stream_id: StreamId::new("s1").unwrap(), context: None, event }
    }

    #[test]
    fn zero_field_events_validate() {
        assert!(validate(&envelope(ObservabilityEvent::SessionStart)).is_ok());
        assert!(validate(&envelope(ObservabilityEvent::Complete)).is_ok());
    }

    #[test]
    fn populated_events_validate() {
        let event = ObservabilityEvent::RetryAttempt { attempt: 2, reason: "timeout".into(), delay_ms: 500 };
        assert!(validate(&envelope(event)).is_ok());
    }

    #[test]
    fn unknown_event_type_rejected() {
        assert!(schema_for("NOT_A_REAL_TYPE").is_none());
    }
}
