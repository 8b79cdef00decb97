//! Worker executor ports - 外部ワーカーの抽象化
//!
//! ディスパッチャはワーカーの具体型を知らない。`WorkerLocator` で worker id
//! から実行可能な参照を取得し、`WorkerExecutor::execute` を 1 回呼ぶ。
//! その呼び出しがワーカーの一生で、完了後にハンドルは残らない。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{BatchId, FleetResult, Outcome, Task, WorkerId};

/// Per-attempt information handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub batch_id: BatchId,
    pub worker_id: WorkerId,

    /// Advisory deadline: the task's own `timeout_ms` if set, otherwise the
    /// fleet's `worker_timeout_ms`. Honoring it is the executor's job.
    pub timeout: Duration,
}

/// Performs one task attempt.
///
/// Failure may be reported either as `Err(..)` or as `Ok(Outcome::failure(..))`;
/// the dispatcher treats both the same.
#[async_trait]
pub trait WorkerExecutor: Send + Sync {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> FleetResult<Outcome>;
}

/// Resolves a worker id to an executor.
#[async_trait]
pub trait WorkerLocator: Send + Sync {
    async fn locate(&self, worker_id: WorkerId) -> FleetResult<Arc<dyn WorkerExecutor>>;
}
