//! Tool-call shape detection. Pure structural matching against
//! `serde_json::Value` — five recognized request shapes plus the symmetric
//! result/error shape. Detection only produces neutral structs; translating
//! them into `ObservabilityEvent::ToolRequested`/`ToolResult`/`ToolError`/
//! `ToolCompleted` and invoking `on_tool_call` is `relay-runtime`'s job,
//! keeping this crate free of a dependency on `relay-events`.

use serde_json::Value;

/// A tool invocation recognized from a `message`-type event's JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedToolCall {
    /// Call id. Synthesized as `fn_<ts>` for the legacy `function_call` shape,
    /// which carries none.
    pub id: String,
    /// Tool/function name.
    pub name: String,
    /// Parsed arguments. Malformed or missing arguments degrade to an empty
    /// object.
    pub arguments: Value,
}

/// A tool result or error, matched against the shape symmetric to
/// `DetectedToolCall`'s.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectedToolResult {
    /// A successful `tool_result` with its output value.
    Ok {
        /// Id of the call this result answers.
        id: String,
        /// Result payload.
        value: Value,
    },
    /// A `tool_result` carrying an error instead of a value.
    Err {
        /// Id of the call this result answers.
        id: String,
        /// Error payload (typically a message string).
        error: Value,
    },
}

/// Parse a possibly-stringified JSON arguments value leniently.: "Stringified
/// JSON `arguments` are parsed leniently; malformed arguments degrade to
/// `{}`."
fn parse_arguments(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::Object(serde_json::Map::new())),
        Some(other) => other.clone(),
        None => Value::Object(serde_json::Map::new()),
    }
}

fn as_str(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Detect tool calls in one `message`-type event's JSON payload, following
/// the five recognized shapes in registration order: (a) flat `tool_call`,
/// (b) flat `tool_calls` array, (c) `tool_use`, (d) nested `tool_call`, (e)
/// legacy `function_call`. `synthetic_ts` is used only for shape (e), which
/// carries no id of its own; callers pass the session clock so ids stay
/// deterministic under replay.
#[must_use]
pub fn detect_tool_call(payload: &Value, synthetic_ts: u64) -> Vec<DetectedToolCall> {
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    let Some(event_type) = as_str(obj, "type") else {
        return Vec::new();
    };

    match event_type.as_str() {
        // (a) flat {type:"tool_call", id, name, arguments}
        "tool_call" if obj.contains_key("name") => {
            let Some(name) = as_str(obj, "name") else { return Vec::new() };
            let id = as_str(obj, "id").unwrap_or_else(|| format!("fn_{synthetic_ts}"));
            vec![DetectedToolCall { id, name, arguments: parse_arguments(obj.get("arguments")) }]
        }
        // (d) nested {type:"tool_call", tool_call:{id,name,arguments}}
        "tool_call" => obj
            .get("tool_call")
            .and_then(Value::as_object)
            .and_then(|inner| {
                let name = as_str(inner, "name")?;
                let id = as_str(inner, "id").unwrap_or_else(|| format!("fn_{synthetic_ts}"));
                Some(DetectedToolCall { id, name, arguments: parse_arguments(inner.get("arguments")) })
            })
            .into_iter()
            .collect(),
        // (b) flat {type:"tool_calls", tool_calls:[{id,name,arguments}]}
        "tool_calls" => obj
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|inner| {
                        let name = as_str(inner, "name")?;
                        let id = as_str(inner, "id").unwrap_or_else(|| format!("fn_{synthetic_ts}"));
                        Some(DetectedToolCall { id, name, arguments: parse_arguments(inner.get("arguments")) })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        // (c) {type:"tool_use", tool_use:{id,name,input}}
        "tool_use" => obj
            .get("tool_use")
            .and_then(Value::as_object)
            .and_then(|inner| {
                let name = as_str(inner, "name")?;
                let id = as_str(inner, "id").unwrap_or_else(|| format!("fn_{synthetic_ts}"));
                Some(DetectedToolCall { id, name, arguments: parse_arguments(inner.get("input")) })
            })
            .into_iter()
            .collect(),
        // (e) legacy {type:"function_call", function_call:{name,arguments}}, id
        // always synthesized
        "function_call" => obj
            .get("function_call")
            .and_then(Value::as_object)
            .and_then(|inner| {
                let name = as_str(inner, "name")?;
                Some(DetectedToolCall {
                    id: format!("fn_{synthetic_ts}"),
                    name,
                    arguments: parse_arguments(inner.get("arguments")),
                })
            })
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

/// Detect a `tool_result` event, the shape symmetric to `tool_call`:
/// `{type:"tool_result", id, result}` or `{type:"tool_result", id, error}`.
#[must_use]
pub fn detect_tool_result(payload: &Value) -> Option<DetectedToolResult> {
    let obj = payload.as_object()?;
    if as_str(obj, "type")?.as_str() != "tool_result" {
        return None;
    }
    let id = as_str(obj, "id")?;
    if let Some(error) = obj.get("error") {
        return Some(DetectedToolResult::Err { id, error: error.clone() });
    }
    Some(DetectedToolResult::Ok { id, value: obj.get("result").cloned().unwrap_or(Value::Null) })
}
