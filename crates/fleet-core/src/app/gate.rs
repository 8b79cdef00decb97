//! ConcurrencyGate - 同時実行数の上限管理
//!
//! 「最大 C 個まで起動し、最初に終わった 1 個を待ち、空いた枠を埋める」
//! セマフォを JoinSet で表現する。上限を守るのはこの in-flight 集合だけで、
//! worker の active カウンタは観測用に過ぎない。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::warn;

use crate::domain::{FleetResult, Outcome, Task, WorkerId};
use crate::ports::{ExecutionContext, WorkerExecutor};

/// How one attempt ended, after normalizing every failure shape
/// (`Err`, failure outcome, panic) into a reason string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttemptOutcome {
    Succeeded(Option<serde_json::Value>),
    Failed(String),
}

impl AttemptOutcome {
    fn from_execution(result: FleetResult<Outcome>) -> Self {
        match result {
            Ok(outcome) if outcome.is_success() => AttemptOutcome::Succeeded(outcome.value),
            Ok(outcome) => AttemptOutcome::Failed(
                outcome
                    .reason
                    .unwrap_or_else(|| "worker reported failure".to_string()),
            ),
            Err(err) => {
                if !err.is_task_level() {
                    // not a task-level variant, but still a failed attempt
                    warn!(error = %err, "Executor returned a structural error");
                }
                AttemptOutcome::Failed(err.to_string())
            }
        }
    }

    fn from_join_error(err: JoinError) -> Self {
        if err.is_cancelled() {
            return AttemptOutcome::Failed("worker was cancelled".to_string());
        }
        AttemptOutcome::Failed(format!("worker panicked: {}", panic_message(err.into_panic())))
    }

    pub(crate) fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded(_))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A resolved in-flight execution.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub(crate) task: Task,
    pub(crate) worker_id: WorkerId,
    pub(crate) duration: Duration,
    pub(crate) outcome: AttemptOutcome,
}

struct InFlight {
    task: Task,
    worker_id: WorkerId,
    started: Instant,
}

pub(crate) struct ConcurrencyGate {
    running: JoinSet<FleetResult<Outcome>>,
    in_flight: HashMap<task::Id, InFlight>,
}

impl ConcurrencyGate {
    pub(crate) fn new() -> Self {
        Self {
            running: JoinSet::new(),
            in_flight: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// `limit` is read fresh by the caller for every slot.
    pub(crate) fn has_capacity(&self, limit: usize) -> bool {
        self.len() < limit
    }

    /// Start one execution as a tracked in-flight operation.
    pub(crate) fn start(
        &mut self,
        task: Task,
        worker_id: WorkerId,
        executor: Arc<dyn WorkerExecutor>,
        ctx: ExecutionContext,
    ) {
        let run_task = task.clone();
        let handle = self
            .running
            .spawn(async move { executor.execute(&run_task, &ctx).await });
        self.in_flight.insert(
            handle.id(),
            InFlight {
                task,
                worker_id,
                started: Instant::now(),
            },
        );
    }

    /// Wait for the first in-flight execution to resolve. `None` once nothing
    /// is in flight.
    pub(crate) async fn next_resolved(&mut self) -> Option<Resolution> {
        loop {
            let (id, outcome) = match self.running.join_next_with_id().await? {
                Ok((id, result)) => (id, AttemptOutcome::from_execution(result)),
                Err(err) => (err.id(), AttemptOutcome::from_join_error(err)),
            };
            // only ids started through `start` are tracked
            let Some(entry) = self.in_flight.remove(&id) else {
                continue;
            };
            return Some(Resolution {
                task: entry.task,
                worker_id: entry.worker_id,
                duration: entry.started.elapsed(),
                outcome,
            });
        }
    }
}
