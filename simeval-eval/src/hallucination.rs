//! Context-grounded hallucination scoring.
//!
//! Extracts entities from the agent's response and checks each against a
//! pool built from all prior turns plus the current user query. Entities
//! the pool cannot ground count toward the hallucination verdict.

use crate::overlap::match_degree;
use serde::{Deserialize, Serialize};
use simeval_core::{Context, EntityExtractor, Result, SimevalError};
use std::sync::Arc;

/// Result of hallucination evaluation for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HallucinationReport {
    /// Fraction of extracted entities grounded in context, in [0,1].
    pub score: f64,
    /// `(1 - score) * 100`; higher is safer.
    pub safe_index: f64,
    /// All entities extracted from the response (lowercased).
    pub extracted: Vec<String>,
    /// Entities or subwords found in context.
    pub matched: Vec<String>,
    /// Subwords not found in context.
    pub unmatched: Vec<String>,
}

/// Evaluator that grounds response entities in prior context.
pub struct HallucinationEvaluator {
    extractor: Arc<dyn EntityExtractor>,
    entity_types: Vec<String>,
    extraction_threshold: f64,
}

impl HallucinationEvaluator {
    /// `extraction_threshold` is the detection confidence floor passed to
    /// the extraction service; must lie in [0,1].
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        entity_types: Vec<String>,
        extraction_threshold: f64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&extraction_threshold) {
            return Err(SimevalError::Configuration(format!(
                "extraction threshold must be between 0 and 1, got {extraction_threshold}"
            )));
        }
        Ok(Self { extractor, entity_types, extraction_threshold })
    }

    pub async fn evaluate(
        &self,
        response: &str,
        prior_context: &Context,
        current_query: &str,
    ) -> Result<HallucinationReport> {
        let entities = self
            .extractor
            .extract(response, &self.entity_types, self.extraction_threshold)
            .await?;

        let mut pool = prior_context.flatten_lowercase();
        if !current_query.is_empty() {
            pool.push(current_query.to_lowercase());
        }

        let total = entities.len();
        let mut matched_weight = 0.0;
        let mut extracted = Vec::with_capacity(total);
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for entity in &entities {
            let keyword = entity.text.to_lowercase();
            extracted.push(keyword.clone());

            let outcome = match_degree(&keyword, &pool);
            matched_weight += outcome.degree;
            matched.extend(outcome.matched);
            unmatched.extend(outcome.unmatched);
        }

        let score = grounded_score(matched_weight, total);
        if !(0.0..=1.0).contains(&score) {
            return Err(SimevalError::ResponseContract(format!(
                "hallucination score out of range: {score}"
            )));
        }

        tracing::debug!(score, total_extracted = total, "hallucination evaluation complete");

        Ok(HallucinationReport {
            score,
            safe_index: safe_index(score),
            extracted,
            matched,
            unmatched,
        })
    }
}

/// Grounded fraction rounded to 2 decimals. A response with nothing
/// extractable asserts nothing new and scores 1.0.
fn grounded_score(matched_weight: f64, total: usize) -> f64 {
    if total > 0 { (matched_weight / total as f64 * 100.0).round() / 100.0 } else { 1.0 }
}

fn safe_index(score: f64) -> f64 {
    (1.0 - score) * 100.0
}
