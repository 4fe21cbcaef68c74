//! LLM-driven matching of a user turn onto a protocol step.

use crate::extract::extract_json_object;
use serde_json::Value;
use simeval_core::{CompletionModel, Context, Protocol, ProtocolStep, Result, SimevalError};
use std::fmt::Write;
use std::sync::Arc;

/// Matches the latest user query against the protocol's trigger events via
/// the completion service. The service's judgment is authoritative; this
/// layer only enforces the single-key JSON contract and resolves the
/// returned name against the protocol.
pub struct StepMatcher {
    model: Arc<dyn CompletionModel>,
}

impl StepMatcher {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn match_step<'a>(
        &self,
        prior_context: &Context,
        query: &str,
        protocol: &'a Protocol,
    ) -> Result<Option<&'a ProtocolStep>> {
        let prompt = build_prompt(prior_context, query, protocol);

        tracing::debug!(model = self.model.name(), "requesting step match");
        let raw = self.model.complete(&prompt).await?;
        let object = extract_json_object(&raw)?;

        let name = match object.get("step_name") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => return Ok(None),
            Some(other) => {
                return Err(SimevalError::ResponseContract(format!(
                    "key 'step_name' must be a string or null, got: {other}"
                )));
            }
            None => {
                return Err(SimevalError::ResponseContract(
                    "missing key 'step_name'".to_string(),
                ));
            }
        };

        // A name outside the protocol is no match, not an error.
        let step = protocol.find_step(&name);
        if step.is_none() {
            tracing::warn!(step_name = %name, "matcher returned a step not in the protocol");
        }
        Ok(step)
    }
}

fn build_prompt(prior_context: &Context, query: &str, protocol: &Protocol) -> String {
    let mut context_str = String::new();
    for entry in prior_context.entries() {
        let _ = writeln!(context_str, "User: {} | AI: {}", entry.user_query, entry.response);
    }

    let mut triggers_str = String::new();
    for step in &protocol.steps {
        let trigger = if step.trigger_event.is_empty() {
            "No trigger event provided. Use your knowledge."
        } else {
            &step.trigger_event
        };
        let _ = writeln!(
            triggers_str,
            "- Step Name: {} | Trigger Event: {}",
            step.step_name, trigger
        );
    }

    format!(
        r#"Role:
You analyze a conversation and match the latest user query against predefined trigger events. Each trigger event belongs to a named protocol step and describes when that step applies.

Task:
- Analyze the conversation history and the latest query.
- If the latest query matches one trigger event's description, return that step name.
- If no trigger event matches, return null.

Input Data:
### Conversation Context:
{context_str}
### Latest Query:
"{query}"

### Trigger Events:
{triggers_str}
Response Format:
Reply with a single valid JSON object:
{{ "step_name": (string) the matched step name, or null if no step matches }}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use simeval_model::MockCompletionModel;

    fn protocol() -> Protocol {
        Protocol::new(
            "billing",
            vec![
                ProtocolStep::new("Retrieve Billing Information")
                    .with_trigger("User asks for billing information for a month and year."),
                ProtocolStep::new("Update Account Details")
                    .with_trigger("User asks to update account information."),
            ],
        )
    }

    #[tokio::test]
    async fn test_matched_name_resolves_case_insensitively() {
        let model = Arc::new(MockCompletionModel::single(
            r#"{"step_name": " retrieve billing information "}"#,
        ));
        let matcher = StepMatcher::new(model.clone());

        let protocol = protocol();
        let step = matcher
            .match_step(&Context::new(), "April 2024", &protocol)
            .await
            .unwrap()
            .expect("step should match");
        assert_eq!(step.step_name, "Retrieve Billing Information");

        let prompts = model.prompts();
        assert!(prompts[0].contains("Retrieve Billing Information"));
        assert!(prompts[0].contains("April 2024"));
    }

    #[tokio::test]
    async fn test_null_means_no_match() {
        let model = Arc::new(MockCompletionModel::single(r#"{"step_name": null}"#));
        let matcher = StepMatcher::new(model);

        let protocol = protocol();
        let step =
            matcher.match_step(&Context::new(), "Where is your office?", &protocol).await.unwrap();
        assert!(step.is_none());
    }

    #[tokio::test]
    async fn test_unknown_name_means_no_match() {
        let model =
            Arc::new(MockCompletionModel::single(r#"{"step_name": "Transfer To Human"}"#));
        let matcher = StepMatcher::new(model);

        let protocol = protocol();
        let step = matcher.match_step(&Context::new(), "agent please", &protocol).await.unwrap();
        assert!(step.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_contract_violation() {
        let model = Arc::new(MockCompletionModel::single(r#"{"step": "x"}"#));
        let matcher = StepMatcher::new(model);

        let protocol = protocol();
        let err =
            matcher.match_step(&Context::new(), "query", &protocol).await.unwrap_err();
        assert!(matches!(err, SimevalError::ResponseContract(_)));
    }
}
