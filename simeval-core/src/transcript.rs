//! Upstream collaborator traits: transcript formatting and protocol building.

use crate::types::{FunctionCall, Protocol, Turn};
use crate::{Result, SimevalError};
use async_trait::async_trait;
use serde_json::Value;

/// Converts a raw agent transcript into the canonical turn sequence.
///
/// Implementations may return an empty list and must never mutate their
/// input.
pub trait ConversationFormatter: Send + Sync {
    fn format(&self, raw_transcript: &Value) -> Result<Vec<Turn>>;
}

/// Builds a [`Protocol`] from example transcripts, typically by summarizing
/// them through a generative model. The generation itself lives outside this
/// crate.
#[async_trait]
pub trait ProtocolBuilder: Send + Sync {
    async fn build(&self, example_transcripts: &[Value], use_case: &str) -> Result<Protocol>;
}

/// Formatter for event-stream transcripts.
///
/// Expects `{"conversation": {"messages": [...]}, "events": [...]}` where
/// function invocations arrive as `llmfunctioncalledevent` entries and each
/// completed exchange is closed by an `agentfinishedevent`. Messages are
/// paired user-then-agent in order.
#[derive(Debug, Default, Clone)]
pub struct EventTranscriptFormatter;

impl EventTranscriptFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Event payloads arrive either as embedded objects or as JSON strings.
    fn event_payload(event: &Value) -> Result<Value> {
        match event.get("payload") {
            Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| {
                SimevalError::Validation(format!("unparsable event payload: {e}"))
            }),
            Some(other) => Ok(other.clone()),
            None => Ok(Value::Null),
        }
    }

    fn message_content(message: &Value) -> String {
        message.get("content").and_then(Value::as_str).unwrap_or_default().to_string()
    }
}

impl ConversationFormatter for EventTranscriptFormatter {
    fn format(&self, raw_transcript: &Value) -> Result<Vec<Turn>> {
        let messages = raw_transcript
            .pointer("/conversation/messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let events = raw_transcript
            .get("events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut turns = Vec::new();
        let mut pending_calls: Vec<FunctionCall> = Vec::new();
        let mut next_message = 0usize;

        for event in &events {
            let event_type = event
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();

            match event_type.as_str() {
                "llmfunctioncalledevent" => {
                    let payload = Self::event_payload(event)?;
                    pending_calls.push(FunctionCall {
                        function_name: payload
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        input_passed: payload
                            .get("param")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default(),
                        output_passed: payload.get("result").cloned().unwrap_or(Value::Null),
                    });
                }
                "agentfinishedevent" => {
                    if next_message + 1 < messages.len() {
                        let user_query = Self::message_content(&messages[next_message]);
                        let response = Self::message_content(&messages[next_message + 1]);
                        next_message += 2;
                        turns.push(
                            Turn::new(user_query, response)
                                .with_function_calls(std::mem::take(&mut pending_calls)),
                        );
                    } else {
                        tracing::warn!("agent finished event without a user/agent message pair");
                    }
                }
                _ => {}
            }
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_pairs_messages_and_calls() {
        let transcript = json!({
            "conversation": {"messages": [
                {"type": "user", "content": "Show me my bills"},
                {"type": "bot", "content": "Which month?"},
                {"type": "user", "content": "April 2024"},
                {"type": "bot", "content": "Here are your bills."}
            ]},
            "events": [
                {"type": "AgentFinishedEvent", "payload": "{}"},
                {"type": "LLMFunctionCalledEvent",
                 "payload": "{\"name\": \"get_billing_statements\", \"param\": {\"month\": \"April\"}, \"result\": {\"status\": \"success\"}}"},
                {"type": "AgentFinishedEvent", "payload": "{}"}
            ]
        });

        let turns = EventTranscriptFormatter::new().format(&transcript).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_query, "Show me my bills");
        assert!(turns[0].actual_function_calls.is_empty());
        assert_eq!(turns[1].user_query, "April 2024");
        assert_eq!(turns[1].actual_function_calls.len(), 1);
        assert_eq!(turns[1].actual_function_calls[0].function_name, "get_billing_statements");
    }

    #[test]
    fn test_format_empty_transcript() {
        let turns = EventTranscriptFormatter::new().format(&json!({})).unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_format_rejects_bad_payload() {
        let transcript = json!({
            "conversation": {"messages": []},
            "events": [{"type": "llmfunctioncalledevent", "payload": "not json"}]
        });
        let err = EventTranscriptFormatter::new().format(&transcript).unwrap_err();
        assert!(matches!(err, SimevalError::Validation(_)));
    }
}
