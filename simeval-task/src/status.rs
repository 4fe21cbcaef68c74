//! Task status lifecycle and the persisted task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a background evaluation task.
///
/// Forward transitions run `Started → Preprocessing → Evaluating → Saving →
/// Completed`; `Failed` is reachable from any state. Each transition is
/// persisted before the next phase begins, so a crash leaves an observable
/// last-known state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Started,
    Preprocessing,
    Evaluating,
    Saving,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// The persisted record polling clients read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    /// Set in the same write as the `Completed` transition.
    pub evaluation_result_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&TaskStatus::Started).unwrap(), "\"STARTED\"");
        assert_eq!(
            serde_json::to_string(&TaskStatus::Preprocessing).unwrap(),
            "\"PREPROCESSING\""
        );
        let status: TaskStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Evaluating.is_terminal());
    }
}
