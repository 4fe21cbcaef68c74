//! # simeval-eval
//!
//! The protocol-adherence evaluation pipeline: per-turn step matching,
//! pluggable evaluators (hallucination, function-call diff, semantic
//! judgment), deterministic scoring, and whole-conversation step-order
//! validation.
//!
//! The pipeline consumes the traits defined in `simeval-core`
//! ([`simeval_core::CompletionModel`], [`simeval_core::EntityExtractor`]);
//! concrete clients live in `simeval-model`.

pub mod extract;
pub mod function_call;
pub mod hallucination;
pub mod order;
pub mod overlap;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod semantic;
pub mod step_match;

pub use extract::extract_json_object;
pub use function_call::{FunctionCallReport, evaluate_function_calls};
pub use hallucination::{HallucinationEvaluator, HallucinationReport};
pub use order::StepOrderValidator;
pub use pipeline::{EvaluationKind, EvaluationPipeline, PipelineConfig};
pub use report::{ConversationReport, TurnEvaluation};
pub use scorer::{DEFAULT_HALLUCINATION_THRESHOLD, ScoreBreakdown, TurnScorer};
pub use semantic::{SemanticEvaluator, SemanticVerdict};
pub use step_match::StepMatcher;
