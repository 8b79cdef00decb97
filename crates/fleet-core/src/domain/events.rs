//! Events - ドメインイベント
//!
//! ディスパッチャの状態遷移ごとに 1 つ発行され、EventSink に渡される。

use serde::{Deserialize, Serialize};

use super::batch::BatchStatus;
use super::ids::{BatchId, TaskId, WorkerId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    BatchSubmitted {
        batch_id: BatchId,
        total_tasks: usize,
    },
    WorkerSpawned {
        batch_id: BatchId,
        worker_id: WorkerId,
        task_id: TaskId,
        attempt: u32,
    },
    TaskSucceeded {
        batch_id: BatchId,
        task_id: TaskId,
        attempt: u32,
        duration_ms: u64,
    },
    TaskRequeued {
        batch_id: BatchId,
        task_id: TaskId,
        next_attempt: u32,
        reason: String,
    },
    TaskFailed {
        batch_id: BatchId,
        task_id: TaskId,
        attempt: u32,
        error: String,
    },
    /// A resolution arrived after the batch went terminal and was dropped.
    LateResultDiscarded {
        batch_id: BatchId,
        task_id: TaskId,
        worker_id: WorkerId,
    },
    BatchFinalized {
        batch_id: BatchId,
        status: BatchStatus,
        completed_tasks: usize,
        failed_tasks: usize,
    },
    BatchCancelled {
        batch_id: BatchId,
    },
    /// The dispatch loop died; the batch was forced to `failed`.
    BatchAborted {
        batch_id: BatchId,
        reason: String,
    },
}

impl DomainEvent {
    pub fn batch_id(&self) -> BatchId {
        match self {
            DomainEvent::BatchSubmitted { batch_id, .. }
            | DomainEvent::WorkerSpawned { batch_id, .. }
            | DomainEvent::TaskSucceeded { batch_id, .. }
            | DomainEvent::TaskRequeued { batch_id, .. }
            | DomainEvent::TaskFailed { batch_id, .. }
            | DomainEvent::LateResultDiscarded { batch_id, .. }
            | DomainEvent::BatchFinalized { batch_id, .. }
            | DomainEvent::BatchCancelled { batch_id }
            | DomainEvent::BatchAborted { batch_id, .. } => *batch_id,
        }
    }

    /// Short snake_case name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BatchSubmitted { .. } => "batch_submitted",
            DomainEvent::WorkerSpawned { .. } => "worker_spawned",
            DomainEvent::TaskSucceeded { .. } => "task_succeeded",
            DomainEvent::TaskRequeued { .. } => "task_requeued",
            DomainEvent::TaskFailed { .. } => "task_failed",
            DomainEvent::LateResultDiscarded { .. } => "late_result_discarded",
            DomainEvent::BatchFinalized { .. } => "batch_finalized",
            DomainEvent::BatchCancelled { .. } => "batch_cancelled",
            DomainEvent::BatchAborted { .. } => "batch_aborted",
        }
    }
}
