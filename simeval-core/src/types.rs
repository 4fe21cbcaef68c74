//! Canonical data model for protocol-adherence evaluation.
//!
//! A [`Protocol`] is the ordered list of steps a conversation is expected to
//! follow; a [`Turn`] is one user/agent exchange with the function calls the
//! agent made. Both are produced upstream and consumed read-only here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A function invocation observed in a conversation turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the invoked function.
    pub function_name: String,
    /// Arguments the agent passed, keyed by parameter name.
    #[serde(default)]
    pub input_passed: Map<String, Value>,
    /// Whatever the function returned.
    #[serde(default)]
    pub output_passed: Value,
}

impl FunctionCall {
    /// Create a call record with no arguments.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self { function_name: function_name.into(), ..Default::default() }
    }

    /// Set the input arguments.
    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input_passed = input;
        self
    }

    /// Set the function output.
    pub fn with_output(mut self, output: Value) -> Self {
        self.output_passed = output;
        self
    }
}

/// One user query / agent response exchange.
///
/// Immutable once produced by the upstream formatter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Turn {
    /// The user's query for this turn.
    pub user_query: String,
    /// Function calls the agent actually made while handling the query.
    #[serde(default)]
    pub actual_function_calls: Vec<FunctionCall>,
    /// The agent's final response text.
    pub response: String,
}

impl Turn {
    /// Create a turn with no function calls.
    pub fn new(user_query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            actual_function_calls: vec![],
            response: response.into(),
        }
    }

    /// Attach the function calls made during this turn.
    pub fn with_function_calls(mut self, calls: Vec<FunctionCall>) -> Self {
        self.actual_function_calls = calls;
        self
    }
}

/// A function a protocol step expects the agent to call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectedFunction {
    /// Name of the expected function.
    pub function_name: String,
    /// Expected input schema/arguments (not diffed by the function-call
    /// evaluator; carried for the semantic evaluator's prompt).
    #[serde(default)]
    pub input_passed: Map<String, Value>,
}

impl ExpectedFunction {
    /// Create an expected function by name.
    pub fn new(function_name: impl Into<String>) -> Self {
        Self { function_name: function_name.into(), input_passed: Map::new() }
    }
}

/// One named step of an interaction protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolStep {
    /// Step name, unique within a protocol.
    pub step_name: String,
    /// Description of when this step applies; shown to the step matcher.
    #[serde(default)]
    pub trigger_event: String,
    /// Functions the agent is expected to call in this step.
    #[serde(default)]
    pub expected_functions: Vec<ExpectedFunction>,
    /// The response the agent is expected to produce.
    #[serde(default)]
    pub expected_response: String,
}

impl ProtocolStep {
    /// Create a step by name.
    pub fn new(step_name: impl Into<String>) -> Self {
        Self { step_name: step_name.into(), ..Default::default() }
    }

    /// Set the trigger-event description.
    pub fn with_trigger(mut self, trigger_event: impl Into<String>) -> Self {
        self.trigger_event = trigger_event.into();
        self
    }

    /// Set the expected functions.
    pub fn with_expected_functions(mut self, functions: Vec<ExpectedFunction>) -> Self {
        self.expected_functions = functions;
        self
    }

    /// Set the expected response text.
    pub fn with_expected_response(mut self, response: impl Into<String>) -> Self {
        self.expected_response = response.into();
        self
    }
}

/// An ordered interaction protocol (a "simulation").
///
/// Step order defines the canonical sequence checked by the step-order
/// validator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Protocol {
    /// Use case or agent name this protocol covers.
    #[serde(default)]
    pub use_case: String,
    /// Ordered steps.
    pub steps: Vec<ProtocolStep>,
}

impl Protocol {
    /// Create a protocol from steps.
    pub fn new(use_case: impl Into<String>, steps: Vec<ProtocolStep>) -> Self {
        Self { use_case: use_case.into(), steps }
    }

    /// Look up a step by name, case-insensitively after trimming.
    pub fn find_step(&self, name: &str) -> Option<&ProtocolStep> {
        let wanted = name.trim().to_lowercase();
        self.steps.iter().find(|s| s.step_name.trim().to_lowercase() == wanted)
    }
}

/// Snapshot of one processed turn, kept as prior context for later turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub user_query: String,
    pub actual_functions: Vec<FunctionCall>,
    pub response: String,
}

/// Append-only accumulation of prior turns for one pipeline run.
///
/// Owned exclusively by a single conversation evaluation; never shared
/// across concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: Vec<ContextEntry>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processed turn. Call only after all evaluators for that
    /// turn have run.
    pub fn push(&mut self, turn: &Turn) {
        self.entries.push(ContextEntry {
            user_query: turn.user_query.clone(),
            actual_functions: turn.actual_function_calls.clone(),
            response: turn.response.clone(),
        });
    }

    /// Prior turns, oldest first.
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flatten every entry (keys and values, across nested structures) into
    /// a pool of lowercase strings for grounding checks.
    pub fn flatten_lowercase(&self) -> Vec<String> {
        let mut pool = Vec::new();
        for entry in &self.entries {
            // serde never fails on these plain data types
            if let Ok(value) = serde_json::to_value(entry) {
                flatten_value_strings(&value, &mut pool);
            }
        }
        pool.iter().map(|s| s.to_lowercase()).collect()
    }
}

/// Recursively collect every key and scalar value as a string.
pub fn flatten_value_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                out.push(key.clone());
                match v {
                    Value::Object(_) | Value::Array(_) => flatten_value_strings(v, out),
                    _ => out.push(scalar_to_string(v)),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => flatten_value_strings(item, out),
                    _ => out.push(scalar_to_string(item)),
                }
            }
        }
        _ => out.push(scalar_to_string(value)),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_step_case_insensitive() {
        let protocol = Protocol::new(
            "billing",
            vec![
                ProtocolStep::new("Retrieve Billing Information"),
                ProtocolStep::new("Update Account Details"),
            ],
        );

        assert!(protocol.find_step(" retrieve billing information ").is_some());
        assert!(protocol.find_step("UPDATE ACCOUNT DETAILS").is_some());
        assert!(protocol.find_step("unknown step").is_none());
    }

    #[test]
    fn test_context_append_and_flatten() {
        let mut ctx = Context::new();
        assert!(ctx.is_empty());

        let turn = Turn::new("show my bills", "Here are your bills for April 2024")
            .with_function_calls(vec![
                FunctionCall::new("get_billing_statements")
                    .with_output(json!({"status": "success", "total": 23.5})),
            ]);
        ctx.push(&turn);

        assert_eq!(ctx.len(), 1);
        let pool = ctx.flatten_lowercase();
        assert!(pool.iter().any(|s| s == "show my bills"));
        assert!(pool.iter().any(|s| s == "get_billing_statements"));
        assert!(pool.iter().any(|s| s == "success"));
        assert!(pool.iter().any(|s| s == "23.5"));
    }

    #[test]
    fn test_flatten_nested_structures() {
        let value = json!({
            "outer": {"inner": ["a", 1, {"deep": true}]},
            "plain": "text"
        });
        let mut out = Vec::new();
        flatten_value_strings(&value, &mut out);

        assert!(out.contains(&"outer".to_string()));
        assert!(out.contains(&"inner".to_string()));
        assert!(out.contains(&"a".to_string()));
        assert!(out.contains(&"1".to_string()));
        assert!(out.contains(&"deep".to_string()));
        assert!(out.contains(&"true".to_string()));
        assert!(out.contains(&"text".to_string()));
    }

    #[test]
    fn test_turn_serde_roundtrip() {
        let json = r#"{
            "user_query": "April 2024",
            "actual_function_calls": [
                {"function_name": "get_billing_statements",
                 "input_passed": {"month": "April"},
                 "output_passed": {"status": "success"}}
            ],
            "response": "Here are your bills."
        }"#;

        let turn: Turn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.user_query, "April 2024");
        assert_eq!(turn.actual_function_calls.len(), 1);
        assert_eq!(turn.actual_function_calls[0].function_name, "get_billing_statements");
    }
}
