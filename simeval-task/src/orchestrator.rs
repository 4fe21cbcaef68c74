//! Submission and background execution of evaluation tasks.
//!
//! `submit` persists the initial `STARTED` record before the worker is
//! spawned, so a poll can never race an unwritten record. From then on the
//! worker is the only writer: it persists each status transition before
//! starting the next phase, and on success writes `COMPLETED` together with
//! the result id in one final update. Results are persisted only when the
//! whole task succeeds.

use crate::status::{TaskRecord, TaskStatus};
use chrono::Utc;
use serde_json::{Value, json};
use simeval_core::{
    ConversationFormatter, DocumentStore, Protocol, ProtocolBuilder, Result, SimevalError, Turn,
};
use simeval_eval::{ConversationReport, EvaluationPipeline};
use std::sync::Arc;

/// One evaluation task's input: raw conversation transcripts to judge, plus
/// the material the protocol is built from.
#[derive(Debug, Clone)]
pub struct EvaluationSubmission {
    /// Raw transcripts of the conversations to evaluate.
    pub conversations: Vec<Value>,
    /// Example transcripts the protocol builder summarizes.
    pub protocol_transcripts: Vec<Value>,
    /// Use-case label for the protocol.
    pub use_case: String,
}

/// Runs submitted evaluations on detached workers and tracks them through
/// the persisted status lifecycle. Tasks share nothing but the store.
pub struct TaskOrchestrator {
    store: Arc<dyn DocumentStore>,
    formatter: Arc<dyn ConversationFormatter>,
    builder: Arc<dyn ProtocolBuilder>,
    pipeline: Arc<EvaluationPipeline>,
}

impl TaskOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        formatter: Arc<dyn ConversationFormatter>,
        builder: Arc<dyn ProtocolBuilder>,
        pipeline: Arc<EvaluationPipeline>,
    ) -> Self {
        Self { store, formatter, builder, pipeline }
    }

    /// Persist a `STARTED` record, launch the evaluation on a detached
    /// worker, and return the task id for polling. There is no cancellation:
    /// a launched task runs to completion or failure.
    pub async fn submit(&self, submission: EvaluationSubmission) -> Result<String> {
        let record = json!({
            "status": TaskStatus::Started,
            "evaluation_result_id": null,
            "created_at": Utc::now(),
        });
        let task_id = self.store.insert(record).await?;
        tracing::info!(task_id = %task_id, "evaluation task submitted");

        let store = self.store.clone();
        let formatter = self.formatter.clone();
        let builder = self.builder.clone();
        let pipeline = self.pipeline.clone();
        let worker_id = task_id.clone();

        tokio::spawn(async move {
            let outcome =
                run_task(&store, &formatter, &builder, &pipeline, &worker_id, submission).await;
            if let Err(e) = outcome {
                tracing::error!(task_id = %worker_id, error = %e, "evaluation task failed");
                if let Err(e) =
                    store.update_by_key(&worker_id, json!({"status": TaskStatus::Failed})).await
                {
                    tracing::error!(task_id = %worker_id, error = %e, "could not persist FAILED status");
                }
            }
        });

        Ok(task_id)
    }

    /// Current state of a task, or `None` for an unknown id.
    pub async fn status(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let Some(doc) = self.store.find_by_key(task_id).await? else {
            return Ok(None);
        };

        let status: TaskStatus =
            serde_json::from_value(doc.get("status").cloned().unwrap_or(Value::Null)).map_err(
                |e| SimevalError::Store(format!("task {task_id} has a malformed status: {e}")),
            )?;
        let evaluation_result_id = doc
            .get("evaluation_result_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let created_at = doc
            .get("created_at")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_else(Utc::now);

        Ok(Some(TaskRecord {
            task_id: task_id.to_string(),
            status,
            evaluation_result_id,
            created_at,
        }))
    }

    /// Fetch a persisted evaluation result document.
    pub async fn result(&self, result_id: &str) -> Result<Option<Value>> {
        self.store.find_by_key(result_id).await
    }
}

async fn set_status(
    store: &Arc<dyn DocumentStore>,
    task_id: &str,
    status: TaskStatus,
) -> Result<()> {
    tracing::info!(task_id = %task_id, ?status, "task status transition");
    store.update_by_key(task_id, json!({"status": status})).await
}

async fn run_task(
    store: &Arc<dyn DocumentStore>,
    formatter: &Arc<dyn ConversationFormatter>,
    builder: &Arc<dyn ProtocolBuilder>,
    pipeline: &Arc<EvaluationPipeline>,
    task_id: &str,
    submission: EvaluationSubmission,
) -> Result<()> {
    set_status(store, task_id, TaskStatus::Preprocessing).await?;
    let protocol: Protocol =
        builder.build(&submission.protocol_transcripts, &submission.use_case).await?;
    let conversations: Vec<Vec<Turn>> = submission
        .conversations
        .iter()
        .map(|raw| formatter.format(raw))
        .collect::<Result<_>>()?;

    set_status(store, task_id, TaskStatus::Evaluating).await?;
    let mut reports: Vec<ConversationReport> = Vec::with_capacity(conversations.len());
    for (idx, turns) in conversations.iter().enumerate() {
        tracing::info!(task_id = %task_id, conversation = idx + 1, "evaluating conversation");
        reports.push(pipeline.evaluate_conversation(&protocol, turns).await?);
    }

    set_status(store, task_id, TaskStatus::Saving).await?;
    let final_scores: Vec<f64> = reports.iter().map(|r| r.final_score).collect();
    let result_doc = json!({
        "final_scores": final_scores,
        "results": serde_json::to_value(&reports)?,
    });
    let result_id = store.insert(result_doc).await?;

    // COMPLETED and the result id land in one write.
    store
        .update_by_key(
            task_id,
            json!({"status": TaskStatus::Completed, "evaluation_result_id": result_id}),
        )
        .await?;
    tracing::info!(task_id = %task_id, result_id = %result_id, "evaluation task completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use simeval_core::{
        ExpectedFunction, FunctionCall, InMemoryDocumentStore, ProtocolStep,
    };
    use simeval_eval::PipelineConfig;
    use simeval_model::{
        FailingCompletionModel, MockCompletionModel, StaticEntityExtractor,
    };
    use std::time::Duration;

    struct FixedProtocolBuilder(Protocol);

    #[async_trait]
    impl ProtocolBuilder for FixedProtocolBuilder {
        async fn build(&self, _transcripts: &[Value], _use_case: &str) -> Result<Protocol> {
            Ok(self.0.clone())
        }
    }

    struct FixedFormatter(Vec<Turn>);

    impl ConversationFormatter for FixedFormatter {
        fn format(&self, _raw: &Value) -> Result<Vec<Turn>> {
            Ok(self.0.clone())
        }
    }

    fn protocol() -> Protocol {
        Protocol::new(
            "billing",
            vec![ProtocolStep::new("Retrieve Billing Information")
                .with_trigger("User asks for billing information.")
                .with_expected_functions(vec![ExpectedFunction::new("get_billing_statements")])
                .with_expected_response("Here are your bills.")],
        )
    }

    fn turns() -> Vec<Turn> {
        vec![Turn::new("show me my bills", "Here are your bills.")
            .with_function_calls(vec![FunctionCall::new("get_billing_statements")])]
    }

    fn orchestrator(model: Arc<dyn simeval_core::CompletionModel>) -> TaskOrchestrator {
        let pipeline = EvaluationPipeline::new(
            model,
            Arc::new(StaticEntityExtractor::empty()),
            PipelineConfig::new(vec!["amount".to_string()])
                .with_evaluations(vec![simeval_eval::EvaluationKind::FunctionCalls]),
        )
        .unwrap();

        TaskOrchestrator::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(FixedFormatter(turns())),
            Arc::new(FixedProtocolBuilder(protocol())),
            Arc::new(pipeline),
        )
    }

    async fn wait_for_terminal(orchestrator: &TaskOrchestrator, task_id: &str) -> TaskRecord {
        for _ in 0..200 {
            let record = orchestrator.status(task_id).await.unwrap().unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} never reached a terminal status");
    }

    #[tokio::test]
    async fn test_lifecycle_started_to_completed_with_result() {
        let model = Arc::new(MockCompletionModel::single(
            r#"{"step_name": "Retrieve Billing Information"}"#,
        ));
        let orchestrator = orchestrator(model);

        let submission = EvaluationSubmission {
            conversations: vec![json!({})],
            protocol_transcripts: vec![],
            use_case: "billing".to_string(),
        };
        let task_id = orchestrator.submit(submission).await.unwrap();

        let record = orchestrator.status(&task_id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Started);
        assert!(record.evaluation_result_id.is_none());

        let record = wait_for_terminal(&orchestrator, &task_id).await;
        assert_eq!(record.status, TaskStatus::Completed);
        let result_id = record.evaluation_result_id.expect("result id must be set");

        let result = orchestrator.result(&result_id).await.unwrap().unwrap();
        assert_eq!(result["final_scores"], json!([100.0]));
        assert_eq!(result["results"][0]["turns"][0]["score"], json!(100.0));
        assert_eq!(result["results"][0]["steps_in_order"], json!(true));
    }

    #[tokio::test]
    async fn test_completion_failure_marks_task_failed_without_result() {
        let orchestrator = orchestrator(Arc::new(FailingCompletionModel::default()));

        let submission = EvaluationSubmission {
            conversations: vec![json!({})],
            protocol_transcripts: vec![],
            use_case: "billing".to_string(),
        };
        let task_id = orchestrator.submit(submission).await.unwrap();

        let record = wait_for_terminal(&orchestrator, &task_id).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.evaluation_result_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_task_id_is_none() {
        let model = Arc::new(MockCompletionModel::new(vec![]));
        let orchestrator = orchestrator(model);
        assert!(orchestrator.status("no-such-task").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tasks_run_independently() {
        // One failing and one succeeding task against the same orchestrator
        // state must not affect each other.
        let ok_model = Arc::new(MockCompletionModel::single(
            r#"{"step_name": "Retrieve Billing Information"}"#,
        ));
        let ok = orchestrator(ok_model);
        let failing = orchestrator(Arc::new(FailingCompletionModel::default()));

        let submission = EvaluationSubmission {
            conversations: vec![json!({})],
            protocol_transcripts: vec![],
            use_case: "billing".to_string(),
        };

        let ok_id = ok.submit(submission.clone()).await.unwrap();
        let failed_id = failing.submit(submission).await.unwrap();

        assert_eq!(wait_for_terminal(&ok, &ok_id).await.status, TaskStatus::Completed);
        assert_eq!(wait_for_terminal(&failing, &failed_id).await.status, TaskStatus::Failed);
    }
}
