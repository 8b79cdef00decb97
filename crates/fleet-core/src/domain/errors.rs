//! Errors - エラー型と分類
//!
//! 呼び出し側に返るのは構造的なエラー（未知の batch id、不正な設定）だけ。
//! タスク単位の失敗はディスパッチャ内部で TaskResult に畳み込まれる。

use thiserror::Error;

use super::ids::{BatchId, TaskId, WorkerId};
use super::task::TaskType;

pub type FleetResult<T> = Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("batch not found: {0}")]
    NotFound(BatchId),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("task execution failed: {0}")]
    TaskExecution(String),

    #[error("retries exhausted for {task_id} after {attempts} attempts: {reason}")]
    RetryExhausted {
        task_id: TaskId,
        attempts: u32,
        reason: String,
    },

    #[error("worker {worker_id} unavailable: {reason}")]
    WorkerUnavailable { worker_id: WorkerId, reason: String },

    #[error("handler not found for task_type={0}")]
    HandlerNotFound(TaskType),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FleetError {
    /// Errors that are folded into a batch's results and never returned from
    /// a query/control operation.
    pub fn is_task_level(&self) -> bool {
        matches!(
            self,
            FleetError::TaskExecution(_)
                | FleetError::RetryExhausted { .. }
                | FleetError::WorkerUnavailable { .. }
                | FleetError::HandlerNotFound(_)
                | FleetError::Serialization(_)
        )
    }
}
