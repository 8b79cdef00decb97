//! RegistryLocator - TypedRegistry を WorkerLocator として使う
//!
//! ワーカーは task_type で handler を引いて 1 回実行するだけの薄い層。
//! 未登録の task_type は HandlerNotFound でタスクの失敗になる。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{FleetError, FleetResult, Outcome, Task, WorkerId};
use crate::ports::{ExecutionContext, WorkerExecutor, WorkerLocator};
use crate::typed::TypedRegistry;

pub struct RegistryLocator {
    executor: Arc<RegistryExecutor>,
}

impl RegistryLocator {
    pub fn new(registry: TypedRegistry) -> Self {
        Self {
            executor: Arc::new(RegistryExecutor {
                registry: Arc::new(registry),
            }),
        }
    }
}

#[async_trait]
impl WorkerLocator for RegistryLocator {
    async fn locate(&self, _worker_id: WorkerId) -> FleetResult<Arc<dyn WorkerExecutor>> {
        let executor: Arc<dyn WorkerExecutor> = self.executor.clone();
        Ok(executor)
    }
}

/// Executes a task by dispatching to the handler registered for its type.
pub struct RegistryExecutor {
    registry: Arc<TypedRegistry>,
}

#[async_trait]
impl WorkerExecutor for RegistryExecutor {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> FleetResult<Outcome> {
        let handler = self
            .registry
            .get(task.task_type())
            .ok_or_else(|| FleetError::HandlerNotFound(task.task_type().clone()))?;

        handler.handle_dyn(task.payload(), ctx).await
    }
}
