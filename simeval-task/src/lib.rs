//! # simeval-task
//!
//! Asynchronous task lifecycle around evaluation runs: submit a batch of
//! conversations, get a task id back immediately, and poll a persisted
//! status record until the run completes or fails.

pub mod orchestrator;
pub mod status;

pub use orchestrator::{EvaluationSubmission, TaskOrchestrator};
pub use status::{TaskRecord, TaskStatus};
