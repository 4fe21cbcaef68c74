//! LLM-judged semantic correctness of a turn.

use crate::extract::{extract_json_object, require_bool, require_string};
use serde::{Deserialize, Serialize};
use simeval_core::{CompletionModel, Context, ExpectedFunction, FunctionCall, Result};
use std::fmt::Write;
use std::sync::Arc;

/// The judge's verdict for one turn. All four fields are required in the
/// completion service's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticVerdict {
    pub is_hallucinated: bool,
    pub correct_response: bool,
    pub follow_up_question: bool,
    pub reasoning: String,
}

impl SemanticVerdict {
    /// Verdict used when semantic evaluation is not configured: treats the
    /// turn as correct and grounded so it cannot penalize the score.
    pub fn neutral() -> Self {
        Self {
            is_hallucinated: false,
            correct_response: true,
            follow_up_question: false,
            reasoning: String::new(),
        }
    }
}

/// Asks a completion service whether the agent's response was correct and
/// grounded, given everything the conversation had established.
pub struct SemanticEvaluator {
    model: Arc<dyn CompletionModel>,
}

impl SemanticEvaluator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn evaluate(
        &self,
        prior_context: &Context,
        query: &str,
        actual_response: &str,
        expected_response: &str,
        actual_functions: &[FunctionCall],
        expected_functions: &[ExpectedFunction],
    ) -> Result<SemanticVerdict> {
        let prompt = build_prompt(
            prior_context,
            query,
            actual_response,
            expected_response,
            actual_functions,
            expected_functions,
        );

        tracing::debug!(model = self.model.name(), "requesting semantic verdict");
        let raw = self.model.complete(&prompt).await?;
        parse_verdict(&raw)
    }
}

/// Parse and validate the judge's reply: exactly the four required keys,
/// each with its primitive type.
pub fn parse_verdict(raw: &str) -> Result<SemanticVerdict> {
    let object = extract_json_object(raw)?;
    Ok(SemanticVerdict {
        is_hallucinated: require_bool(&object, "is_hallucinated")?,
        correct_response: require_bool(&object, "correct_response")?,
        follow_up_question: require_bool(&object, "follow_up_question")?,
        reasoning: require_string(&object, "reasoning")?,
    })
}

fn format_functions(name: &str, inputs: &serde_json::Map<String, serde_json::Value>) -> String {
    format!("Function: {name} | Input: {}", serde_json::Value::Object(inputs.clone()))
}

fn build_prompt(
    prior_context: &Context,
    query: &str,
    actual_response: &str,
    expected_response: &str,
    actual_functions: &[FunctionCall],
    expected_functions: &[ExpectedFunction],
) -> String {
    let mut context_str = String::new();
    for entry in prior_context.entries() {
        let calls: Vec<String> = entry
            .actual_functions
            .iter()
            .map(|c| {
                format!(
                    "{} | Output: {}",
                    format_functions(&c.function_name, &c.input_passed),
                    c.output_passed
                )
            })
            .collect();
        let _ = writeln!(
            context_str,
            "User: {}\nFunctions called: [{}]\nAI: {}",
            entry.user_query,
            calls.join("; "),
            entry.response
        );
    }

    let actual_functions_str = actual_functions
        .iter()
        .map(|c| {
            format!(
                "{} | Output: {}",
                format_functions(&c.function_name, &c.input_passed),
                c.output_passed
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let expected_functions_str = expected_functions
        .iter()
        .map(|f| format_functions(&f.function_name, &f.input_passed))
        .collect::<Vec<_>>()
        .join("\n");

    let expected_response = if expected_response.is_empty() {
        "No expected response is given. Judge the actual response against the query, the \
         conversation context and the function outputs."
    } else {
        expected_response
    };

    format!(
        r#"Role:
You are an expert evaluator of AI agents. Compare the agent's actual response and function calls against the expected ones for the latest user query.

Tasks:
1. Decide whether the actual response is correct. When an expected response is given, use it and the function outputs as the reference; a follow-up question related to the expected response still counts as correct. When no expected response is given, judge correctness from the conversation context alone.
2. Decide whether the actual response contains hallucinated information: names, organizations, services, dates, amounts or other specifics that appear in neither the conversation context, the latest user query, nor any function output. Do not consider function-call correctness here.
3. Decide whether the actual response is a follow-up question.
4. Explain your verdict. Do not use quotes or curly brackets in the reasoning.

Input Data:
### Conversation Context:
{context_str}
### Latest Query:
"{query}"

### Actual Response:
"{actual_response}"

### Expected Response:
"{expected_response}"

### Actual Functions:
{actual_functions_str}

### Expected Functions:
{expected_functions_str}

Response Format:
Reply with a single valid JSON object:
{{
    "is_hallucinated": (boolean) whether the actual response contains hallucinated information,
    "correct_response": (boolean) whether the actual response is correct,
    "follow_up_question": (boolean) whether the actual response is a follow-up question,
    "reasoning": (string) explanation of the verdict
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use simeval_core::SimevalError;
    use simeval_model::MockCompletionModel;

    #[tokio::test]
    async fn test_evaluate_parses_verdict() {
        let model = Arc::new(MockCompletionModel::single(
            r#"Here you go: {"is_hallucinated": false, "correct_response": true, "follow_up_question": false, "reasoning": "Response matches expectations."}"#,
        ));
        let evaluator = SemanticEvaluator::new(model.clone());

        let verdict = evaluator
            .evaluate(
                &Context::new(),
                "April 2024",
                "Here are your bills for April 2024.",
                "Here are your bills for April 2024. Click <link>",
                &[FunctionCall::new("get_billing_statements")],
                &[ExpectedFunction::new("get_billing_statements")],
            )
            .await
            .unwrap();

        assert!(verdict.correct_response);
        assert!(!verdict.is_hallucinated);

        let prompts = model.prompts();
        assert!(prompts[0].contains("April 2024"));
        assert!(prompts[0].contains("get_billing_statements"));
    }

    #[tokio::test]
    async fn test_missing_key_is_contract_violation() {
        let model = Arc::new(MockCompletionModel::single(
            r#"{"is_hallucinated": false, "correct_response": true, "reasoning": "ok"}"#,
        ));
        let evaluator = SemanticEvaluator::new(model);

        let err = evaluator
            .evaluate(&Context::new(), "q", "r", "", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SimevalError::ResponseContract(_)));
    }

    #[test]
    fn test_wrong_type_is_contract_violation() {
        let raw = r#"{"is_hallucinated": "no", "correct_response": true, "follow_up_question": false, "reasoning": "ok"}"#;
        assert!(matches!(parse_verdict(raw), Err(SimevalError::ResponseContract(_))));
    }
}
