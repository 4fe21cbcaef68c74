//! Scripted in-memory service doubles for tests.

use async_trait::async_trait;
use simeval_core::{CompletionModel, EntityExtractor, ExtractedEntity, Result, SimevalError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Completion model that replays a scripted queue of responses.
///
/// Each `complete` call pops the next response and records the prompt it was
/// given, so tests can assert on both sides of the exchange. An empty queue
/// is an error rather than a silent default.
pub struct MockCompletionModel {
    name: String,
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock-model".to_string(),
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Single-response convenience constructor.
    pub fn single(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for MockCompletionModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SimevalError::Model("mock response queue exhausted".to_string()))
    }
}

/// Completion model whose every call fails, for error-path tests.
pub struct FailingCompletionModel {
    message: String,
}

impl FailingCompletionModel {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Default for FailingCompletionModel {
    fn default() -> Self {
        Self::new("simulated completion failure")
    }
}

#[async_trait]
impl CompletionModel for FailingCompletionModel {
    fn name(&self) -> &str {
        "failing-model"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(SimevalError::Model(self.message.clone()))
    }
}

/// Entity extractor that returns a fixed entity list, filtered by the
/// requested threshold.
#[derive(Debug, Clone, Default)]
pub struct StaticEntityExtractor {
    entities: Vec<ExtractedEntity>,
}

impl StaticEntityExtractor {
    pub fn new(entities: Vec<ExtractedEntity>) -> Self {
        Self { entities }
    }

    /// Extractor that finds nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityExtractor for StaticEntityExtractor {
    async fn extract(
        &self,
        _text: &str,
        _entity_types: &[String],
        threshold: f64,
    ) -> Result<Vec<ExtractedEntity>> {
        Ok(self.entities.iter().filter(|e| e.score >= threshold).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pops_in_order_and_records_prompts() {
        let model = MockCompletionModel::new(vec!["first".into(), "second".into()]);

        assert_eq!(model.complete("prompt a").await.unwrap(), "first");
        assert_eq!(model.complete("prompt b").await.unwrap(), "second");
        assert_eq!(model.prompts(), vec!["prompt a", "prompt b"]);

        let err = model.complete("prompt c").await.unwrap_err();
        assert!(matches!(err, SimevalError::Model(_)));
    }

    #[tokio::test]
    async fn test_failing_model_always_errors() {
        let model = FailingCompletionModel::default();
        assert!(model.complete("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_static_extractor_filters_by_threshold() {
        let extractor = StaticEntityExtractor::new(vec![
            ExtractedEntity { text: "$23.00".into(), label: "amount".into(), score: 0.9 },
            ExtractedEntity { text: "maybe".into(), label: "misc".into(), score: 0.4 },
        ]);

        let found = extractor.extract("text", &[], 0.7).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "$23.00");
    }
}
