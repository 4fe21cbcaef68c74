//! Boundary parsing of free-form completion output.
//!
//! Completion services return prose around the JSON they were asked for.
//! All shape checking against that free-text contract lives here, so a
//! malformed reply surfaces as a [`SimevalError::ResponseContract`] instead
//! of propagating as a missing value.

use serde_json::Value;
use simeval_core::{Result, SimevalError};

/// Extract the first balanced-brace JSON object from raw completion text
/// and parse it.
///
/// Scans from the first `{` tracking brace depth, skipping braces inside
/// string literals (with escape handling). Anything other than one complete,
/// parsable object is a contract violation.
pub fn extract_json_object(raw: &str) -> Result<Value> {
    let start = raw.find('{').ok_or_else(|| {
        SimevalError::ResponseContract(format!("no JSON object in completion output: {raw}"))
    })?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &raw[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate).map_err(|e| {
                        SimevalError::ResponseContract(format!(
                            "unparsable JSON object in completion output: {e}"
                        ))
                    });
                }
            }
            _ => {}
        }
    }

    Err(SimevalError::ResponseContract(format!(
        "unbalanced JSON object in completion output: {raw}"
    )))
}

/// Fetch a required boolean key.
pub fn require_bool(object: &Value, key: &str) -> Result<bool> {
    match object.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(SimevalError::ResponseContract(format!(
            "key '{key}' must be a boolean, got: {other}"
        ))),
        None => Err(SimevalError::ResponseContract(format!("missing key '{key}'"))),
    }
}

/// Fetch a required string key.
pub fn require_string(object: &Value, key: &str) -> Result<String> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SimevalError::ResponseContract(format!(
            "key '{key}' must be a string, got: {other}"
        ))),
        None => Err(SimevalError::ResponseContract(format!("missing key '{key}'"))),
    }
}
