//! Worker handle: observability record for one ephemeral worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BatchId, TaskId, WorkerId};

/// State transitions:
/// - Spawning -> Active -> Completed | Failed
/// - Spawning -> Failed (executor could not be located)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Spawning,
    Active,
    Completed,
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Completed | WorkerStatus::Failed)
    }
}

/// One dispatched attempt's worker.
///
/// Not used to enforce the concurrency bound; that is the dispatch loop's
/// in-flight set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub batch_id: BatchId,
    pub task_id: TaskId,
    pub attempt: u32,
    pub status: WorkerStatus,
    pub spawned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkerHandle {
    pub fn spawning(
        id: WorkerId,
        batch_id: BatchId,
        task_id: TaskId,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            batch_id,
            task_id,
            attempt,
            status: WorkerStatus::Spawning,
            spawned_at: now,
            completed_at: None,
        }
    }

    /// Spawning -> Active.
    pub fn activate(&mut self) -> bool {
        if self.status != WorkerStatus::Spawning {
            return false;
        }
        self.status = WorkerStatus::Active;
        true
    }

    /// Move to Completed/Failed. Returns the status held before the call, or
    /// `None` if the handle was already terminal.
    pub fn finish(&mut self, success: bool, now: DateTime<Utc>) -> Option<WorkerStatus> {
        if self.status.is_terminal() {
            return None;
        }
        let previous = self.status;
        self.status = if success {
            WorkerStatus::Completed
        } else {
            WorkerStatus::Failed
        };
        self.completed_at = Some(now);
        Some(previous)
    }
}
