//! Per-turn and per-conversation evaluation records.

use crate::function_call::FunctionCallReport;
use crate::hallucination::HallucinationReport;
use crate::semantic::SemanticVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed per-turn record. Each evaluator contributes its own named section;
/// a section is `None` when that evaluator was not configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvaluation {
    pub user_query: String,
    pub response: String,
    /// Name of the matched protocol step, if any.
    pub matched_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hallucination: Option<HallucinationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<FunctionCallReport>,
    /// Per-turn score in [0,100].
    pub score: f64,
    pub step_followed: bool,
    pub reasoning: String,
    /// Whole-conversation verdict, broadcast onto every turn after the run.
    pub steps_in_order: bool,
}

/// Result of evaluating one whole conversation against a protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationReport {
    pub use_case: String,
    pub turns: Vec<TurnEvaluation>,
    /// Mean of the per-turn scores.
    pub final_score: f64,
    pub steps_in_order: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl ConversationReport {
    pub fn new(use_case: impl Into<String>, turns: Vec<TurnEvaluation>, steps_in_order: bool) -> Self {
        let final_score = if turns.is_empty() {
            0.0
        } else {
            turns.iter().map(|t| t.score).sum::<f64>() / turns.len() as f64
        };
        Self {
            use_case: use_case.into(),
            turns,
            final_score,
            steps_in_order,
            evaluated_at: Utc::now(),
        }
    }
}
