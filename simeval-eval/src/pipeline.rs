//! Per-conversation evaluation pipeline.
//!
//! For each turn: match a protocol step, run the configured evaluators,
//! score, and only then append the turn to the running context — so no
//! evaluator ever sees the current turn's own response as prior context.
//! After the last turn, the matched-step sequence is validated against the
//! protocol order and the verdict broadcast onto every turn record.

use crate::function_call::evaluate_function_calls;
use crate::hallucination::HallucinationEvaluator;
use crate::order::StepOrderValidator;
use crate::report::{ConversationReport, TurnEvaluation};
use crate::scorer::{DEFAULT_HALLUCINATION_THRESHOLD, TurnScorer};
use crate::semantic::{SemanticEvaluator, SemanticVerdict};
use crate::step_match::StepMatcher;
use serde::{Deserialize, Serialize};
use simeval_core::{
    CompletionModel, Context, EntityExtractor, Protocol, Result, SimevalError, Turn,
};
use std::sync::Arc;

/// The evaluators a pipeline run executes per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    Hallucination,
    FunctionCalls,
    Semantic,
}

/// Pipeline configuration. Validated at pipeline construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Evaluators to run per turn; must be non-empty.
    pub evaluations: Vec<EvaluationKind>,
    /// Entity-type labels handed to the extraction service.
    pub entity_types: Vec<String>,
    /// Detection confidence floor for entity extraction, in [0,1].
    pub extraction_threshold: f64,
    /// Hallucination scores at or above this count as hallucinated, in [0,1].
    pub hallucination_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evaluations: vec![
                EvaluationKind::Hallucination,
                EvaluationKind::FunctionCalls,
                EvaluationKind::Semantic,
            ],
            entity_types: Vec::new(),
            extraction_threshold: 0.5,
            hallucination_threshold: DEFAULT_HALLUCINATION_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Default evaluator set with the given entity-type labels.
    pub fn new(entity_types: Vec<String>) -> Self {
        Self { entity_types, ..Self::default() }
    }

    pub fn with_evaluations(mut self, evaluations: Vec<EvaluationKind>) -> Self {
        self.evaluations = evaluations;
        self
    }

    pub fn with_extraction_threshold(mut self, threshold: f64) -> Self {
        self.extraction_threshold = threshold;
        self
    }

    pub fn with_hallucination_threshold(mut self, threshold: f64) -> Self {
        self.hallucination_threshold = threshold;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.evaluations.is_empty() {
            return Err(SimevalError::Configuration(
                "at least one evaluation must be configured".to_string(),
            ));
        }
        Ok(())
    }

    fn enables(&self, kind: EvaluationKind) -> bool {
        self.evaluations.contains(&kind)
    }
}

/// Orchestrates step matching, the configured evaluators, scoring and
/// step-order validation for one conversation at a time.
pub struct EvaluationPipeline {
    matcher: StepMatcher,
    semantic: SemanticEvaluator,
    hallucination: HallucinationEvaluator,
    scorer: TurnScorer,
    config: PipelineConfig,
}

impl EvaluationPipeline {
    /// Fails fast on configuration problems (empty evaluator set,
    /// out-of-range thresholds).
    pub fn new(
        model: Arc<dyn CompletionModel>,
        extractor: Arc<dyn EntityExtractor>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: StepMatcher::new(model.clone()),
            semantic: SemanticEvaluator::new(model),
            hallucination: HallucinationEvaluator::new(
                extractor,
                config.entity_types.clone(),
                config.extraction_threshold,
            )?,
            scorer: TurnScorer::new(config.hallucination_threshold)?,
            config,
        })
    }

    /// Evaluate one conversation against a protocol.
    pub async fn evaluate_conversation(
        &self,
        protocol: &Protocol,
        turns: &[Turn],
    ) -> Result<ConversationReport> {
        validate_turns(turns)?;
        validate_protocol(protocol)?;

        let order_validator = StepOrderValidator::new(protocol);
        let mut context = Context::new();
        let mut matched_names: Vec<Option<String>> = Vec::with_capacity(turns.len());
        let mut evaluations: Vec<TurnEvaluation> = Vec::with_capacity(turns.len());

        for (idx, turn) in turns.iter().enumerate() {
            tracing::info!(turn = idx + 1, "evaluating conversation turn");

            let matched_step =
                self.matcher.match_step(&context, &turn.user_query, protocol).await?;
            matched_names.push(matched_step.map(|s| s.step_name.clone()));

            let expected_functions =
                matched_step.map(|s| s.expected_functions.as_slice()).unwrap_or(&[]);
            let expected_response =
                matched_step.map(|s| s.expected_response.as_str()).unwrap_or("");

            let hallucination = if self.config.enables(EvaluationKind::Hallucination) {
                Some(
                    self.hallucination
                        .evaluate(&turn.response, &context, &turn.user_query)
                        .await?,
                )
            } else {
                None
            };

            let function_calls = if self.config.enables(EvaluationKind::FunctionCalls) {
                Some(evaluate_function_calls(&turn.actual_function_calls, expected_functions))
            } else {
                None
            };

            let semantic = if self.config.enables(EvaluationKind::Semantic) {
                Some(
                    self.semantic
                        .evaluate(
                            &context,
                            &turn.user_query,
                            &turn.response,
                            expected_response,
                            &turn.actual_function_calls,
                            expected_functions,
                        )
                        .await?,
                )
            } else {
                None
            };

            // Disabled evaluators feed neutral signals into the scorer.
            let hallucination_score = hallucination.as_ref().map(|h| h.score).unwrap_or(0.0);
            let verdict = semantic.clone().unwrap_or_else(SemanticVerdict::neutral);
            let expected_names: Vec<String> =
                expected_functions.iter().map(|f| f.function_name.clone()).collect();
            let actual_names: Vec<String> = turn
                .actual_function_calls
                .iter()
                .map(|c| c.function_name.clone())
                .collect();

            let breakdown = self.scorer.score(
                matched_step.is_some(),
                &expected_names,
                &actual_names,
                hallucination_score,
                &verdict,
            )?;
            tracing::debug!(score = breakdown.score, "turn scored");

            evaluations.push(TurnEvaluation {
                user_query: turn.user_query.clone(),
                response: turn.response.clone(),
                matched_step: matched_step.map(|s| s.step_name.clone()),
                hallucination,
                semantic,
                function_calls,
                score: breakdown.score,
                step_followed: breakdown.step_followed,
                reasoning: breakdown.reasoning,
                steps_in_order: true,
            });

            // Strictly after all evaluators for this turn have run.
            context.push(turn);
        }

        let steps_in_order = order_validator.validate(&matched_names);
        for evaluation in &mut evaluations {
            evaluation.steps_in_order = steps_in_order;
        }

        let report = ConversationReport::new(protocol.use_case.clone(), evaluations, steps_in_order);
        tracing::info!(
            final_score = report.final_score,
            steps_in_order,
            "conversation evaluation complete"
        );
        Ok(report)
    }
}

fn validate_turns(turns: &[Turn]) -> Result<()> {
    for (idx, turn) in turns.iter().enumerate() {
        if turn.user_query.trim().is_empty() {
            return Err(SimevalError::Validation(format!(
                "turn {idx} has an empty user_query"
            )));
        }
        if turn.response.trim().is_empty() {
            return Err(SimevalError::Validation(format!("turn {idx} has an empty response")));
        }
    }
    Ok(())
}

fn validate_protocol(protocol: &Protocol) -> Result<()> {
    for (idx, step) in protocol.steps.iter().enumerate() {
        if step.step_name.trim().is_empty() {
            return Err(SimevalError::Validation(format!(
                "protocol step {idx} has an empty step_name"
            )));
        }
    }
    Ok(())
}
