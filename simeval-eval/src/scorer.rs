//! Deterministic per-turn scoring.

use crate::semantic::SemanticVerdict;
use serde::{Deserialize, Serialize};
use simeval_core::{Result, SimevalError};

/// Default hallucination threshold: scores at or above it count as
/// hallucinated.
pub const DEFAULT_HALLUCINATION_THRESHOLD: f64 = 0.7;

/// The scorer's output for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Per-turn score in [0,100].
    pub score: f64,
    /// Whether the turn followed the protocol step (or correctly did
    /// nothing when no step applied).
    pub step_followed: bool,
    pub reasoning: String,
    /// Expected functions the agent did not call.
    pub missing_functions: Vec<String>,
    /// Called functions no step expected.
    pub incorrect_functions: Vec<String>,
}

/// Combines step match, function diff and hallucination/correctness signals
/// into a 0-100 score via a fixed rule table. Pure: identical inputs always
/// yield identical output.
#[derive(Debug, Clone)]
pub struct TurnScorer {
    hallucination_threshold: f64,
}

impl Default for TurnScorer {
    fn default() -> Self {
        Self { hallucination_threshold: DEFAULT_HALLUCINATION_THRESHOLD }
    }
}

impl TurnScorer {
    /// `hallucination_threshold` must lie in [0,1].
    pub fn new(hallucination_threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&hallucination_threshold) {
            return Err(SimevalError::Configuration(format!(
                "hallucination threshold must be between 0 and 1, got {hallucination_threshold}"
            )));
        }
        Ok(Self { hallucination_threshold })
    }

    /// Score one turn. `expected_fn_names` and `actual_fn_names` are
    /// compared lower-cased; `hallucination_score` must lie in [0,1].
    pub fn score(
        &self,
        step_matched: bool,
        expected_fn_names: &[String],
        actual_fn_names: &[String],
        hallucination_score: f64,
        semantic: &SemanticVerdict,
    ) -> Result<ScoreBreakdown> {
        if !(0.0..=1.0).contains(&hallucination_score) {
            return Err(SimevalError::ResponseContract(format!(
                "hallucination score out of range: {hallucination_score}"
            )));
        }

        let expected: Vec<String> =
            expected_fn_names.iter().map(|n| n.to_lowercase()).collect();
        let actual: Vec<String> = actual_fn_names.iter().map(|n| n.to_lowercase()).collect();
        let hallucinated = hallucination_score >= self.hallucination_threshold;

        let mut score: f64;
        let mut step_followed = false;
        let mut reasoning = String::new();
        let mut missing = Vec::new();
        let mut incorrect = Vec::new();

        if step_matched {
            if expected.is_empty() {
                // The step itself was satisfied with nothing to call.
                score = 100.0;
                step_followed = true;
            } else {
                score = 0.0;
                let per_function = 100.0 / expected.len() as f64;
                for name in &expected {
                    if actual.contains(name) {
                        score += per_function;
                        step_followed = true;
                    } else {
                        missing.push(name.clone());
                    }
                }
            }
            for name in &actual {
                if !expected.contains(name) {
                    incorrect.push(name.clone());
                }
            }

            if hallucinated && !semantic.correct_response {
                score = 0.0;
                reasoning =
                    "The response is hallucinated and not correct.".to_string();
            } else if hallucinated {
                score /= 2.0;
                reasoning = "Score halved: the response is hallucinated.".to_string();
            } else if !semantic.correct_response {
                score /= 2.0;
                reasoning = "Score halved: the response is not correct.".to_string();
            }
        } else if actual.is_empty() {
            // No step applied and the agent correctly called nothing.
            step_followed = true;
            reasoning =
                "No step matched and no functions were called during the query.".to_string();
            score = if hallucinated {
                0.0
            } else if semantic.correct_response {
                100.0
            } else {
                50.0
            };
        } else {
            score = 0.0;
            step_followed = false;
            incorrect = actual.clone();
            reasoning = "No step matched the query, but the agent invoked functions anyway; \
                         the calls were unnecessary."
                .to_string();
        }

        Ok(ScoreBreakdown {
            score,
            step_followed,
            reasoning,
            missing_functions: missing,
            incorrect_functions: incorrect,
        })
    }
}
