//! External model-service traits.
//!
//! Both services are consumed as injected handles (`Arc<dyn …>`) owned by
//! process bootstrap; nothing in the evaluator holds a global client.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Text-completion service.
///
/// Returns raw text; it is not guaranteed to be JSON, so callers must parse
/// defensively.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model or deployment name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Send a prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// An entity found by the extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// The extracted span of text.
    pub text: String,
    /// The entity type label it was matched against.
    pub label: String,
    /// Detection confidence in [0,1].
    pub score: f64,
}

/// Named-entity extraction service.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract entities of the given types from `text`, keeping only
    /// detections at or above `threshold`.
    async fn extract(
        &self,
        text: &str,
        entity_types: &[String],
        threshold: f64,
    ) -> Result<Vec<ExtractedEntity>>;
}
