//! Outcome and TaskResult: what a worker reports, and what a batch records.
//!
//! `Outcome` is the executor-facing shape (one attempt, no bookkeeping).
//! `TaskResult` is the batch-facing record, stamped by the dispatcher once a
//! task has reached its final outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TaskId, WorkerId};

/// Classification of one attempt.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// Result of a single attempt as reported by a worker.
///
/// A worker may also fail by returning `Err(..)` from `execute`; the dispatcher
/// treats both the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            value: None,
            reason: None,
        }
    }

    pub fn success_with(value: serde_json::Value) -> Self {
        Self {
            value: Some(value),
            ..Self::success()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            value: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

/// Final result of one task within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    /// Attempt number that produced this result (0 = first try).
    pub attempt: u32,
    pub worker_id: WorkerId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn succeeded(
        task_id: TaskId,
        attempt: u32,
        worker_id: WorkerId,
        value: Option<serde_json::Value>,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            worker_id,
            success: true,
            value,
            error: None,
            duration_ms,
            completed_at,
        }
    }

    pub fn failed(
        task_id: TaskId,
        attempt: u32,
        worker_id: WorkerId,
        error: impl Into<String>,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            worker_id,
            success: false,
            value: None,
            error: Some(error.into()),
            duration_ms,
            completed_at,
        }
    }
}
