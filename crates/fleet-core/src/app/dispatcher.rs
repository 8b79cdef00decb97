//! FleetDispatcher - batch の受付・照会・制御
//!
//! 状態の変更はすべて `FleetState` の Mutex の内側で行い、外部ワーカー呼び出し
//! (`locate` / `execute`) の間はロックを握らない。dispatch loop の await
//! ごとに他の呼び出し（cancel, scale, status）が割り込める。

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{Instrument, info, info_span};

use crate::domain::{
    BatchId, BatchRecord, BatchStatusView, Decider, DecisionRecord, DomainEvent, FleetConfig,
    FleetConfigPatch, FleetError, FleetResult, Task, TaskResult, WorkerHandle,
};
use crate::ports::{Clock, EventSink, IdGenerator, WorkerLocator};

use super::builder::FleetBuilder;
use super::dispatch_loop;
use super::state::FleetState;
use super::status::{FleetSnapshot, FleetStats};

/// Shared core of a dispatcher; the dispatch loops hold an `Arc` to it.
pub(crate) struct Inner {
    pub(crate) state: Mutex<FleetState>,
    pub(crate) locator: Arc<dyn WorkerLocator>,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Signalled whenever a batch becomes terminal.
    pub(crate) finished: Notify,
}

impl Inner {
    /// Emit `BatchFinalized` if `record` just became terminal.
    pub(crate) fn announce_final(&self, record: &BatchRecord) {
        self.events.emit(DomainEvent::BatchFinalized {
            batch_id: record.batch_id,
            status: record.status,
            completed_tasks: record.completed_tasks,
            failed_tasks: record.failed_tasks,
        });
    }
}

/// Accepts batches and drives them to a terminal status on a bounded pool of
/// ephemeral workers.
///
/// Cheap to clone; clones share the same state.
///
/// `worker_timeout_ms` is advisory: it is handed to each executor through
/// `ExecutionContext::timeout`, and the dispatcher never preempts a stalled
/// execution.
#[derive(Clone)]
pub struct FleetDispatcher {
    inner: Arc<Inner>,
}

impl FleetDispatcher {
    pub fn builder() -> FleetBuilder {
        FleetBuilder::new()
    }

    pub(crate) fn from_parts(
        config: FleetConfig,
        locator: Arc<dyn WorkerLocator>,
        decider: Arc<dyn Decider>,
        events: Arc<dyn EventSink>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(FleetState::new(config)),
                locator,
                decider,
                events,
                ids,
                clock,
                finished: Notify::new(),
            }),
        }
    }

    /// Create a batch and start dispatching it.
    ///
    /// Returns as soon as the batch is recorded and moved to `processing`;
    /// the dispatch loop runs on the tokio runtime. Poll
    /// [`get_batch_status`](Self::get_batch_status) or await
    /// [`wait_for_batch`](Self::wait_for_batch). An empty batch is terminal
    /// (`completed`) before this returns.
    pub async fn submit_batch(&self, tasks: Vec<Task>) -> BatchId {
        let inner = &self.inner;
        let batch_id = inner.ids.generate_batch_id();
        let now = inner.clock.now();

        let finished_now = {
            let mut state = inner.state.lock().await;
            let mut record = BatchRecord::new(batch_id, tasks.len(), now);
            inner.events.emit(DomainEvent::BatchSubmitted {
                batch_id,
                total_tasks: tasks.len(),
            });
            record.start(now);
            let finished_now = record.try_finalize(now).is_some();
            if finished_now {
                inner.announce_final(&record);
            }
            state.batches.insert(batch_id, record);
            state.counters.batches_submitted += 1;
            finished_now
        };

        if finished_now {
            inner.finished.notify_waiters();
        } else {
            let span = info_span!("batch", batch_id = %batch_id);
            tokio::spawn(
                dispatch_loop::supervise(Arc::clone(inner), batch_id, tasks).instrument(span),
            );
        }
        batch_id
    }

    pub async fn get_batch_status(&self, batch_id: BatchId) -> FleetResult<BatchStatusView> {
        let state = self.inner.state.lock().await;
        Ok(state.batch(batch_id)?.status_view())
    }

    /// Results recorded so far, in completion order.
    pub async fn get_batch_results(&self, batch_id: BatchId) -> FleetResult<Vec<TaskResult>> {
        let state = self.inner.state.lock().await;
        Ok(state.batch(batch_id)?.results.clone())
    }

    /// Retry-policy decisions made for the batch, oldest first.
    pub async fn get_batch_decisions(&self, batch_id: BatchId) -> FleetResult<Vec<DecisionRecord>> {
        let state = self.inner.state.lock().await;
        Ok(state.batch(batch_id)?.decisions.clone())
    }

    /// Mark the batch terminal (`failed`) immediately.
    ///
    /// In-flight executions keep running; their results are discarded when
    /// they arrive. Returns `false` if the batch was already terminal.
    pub async fn cancel_batch(&self, batch_id: BatchId) -> FleetResult<bool> {
        let now = self.inner.clock.now();
        let cancelled = {
            let mut state = self.inner.state.lock().await;
            let batch = state.batch_mut(batch_id)?;
            let cancelled = batch.cancel(now);
            if cancelled {
                self.inner
                    .events
                    .emit(DomainEvent::BatchCancelled { batch_id });
                self.inner.announce_final(batch);
            }
            cancelled
        };
        if cancelled {
            self.inner.finished.notify_waiters();
        }
        Ok(cancelled)
    }

    /// Change `max_concurrent_workers` for slots filled from now on.
    pub async fn scale_workers(&self, n: usize) -> FleetResult<()> {
        if n < 1 {
            return Err(FleetError::Validation(format!(
                "worker count must be at least 1, got {n}"
            )));
        }
        let mut state = self.inner.state.lock().await;
        let previous = state.config.max_concurrent_workers;
        state.config.max_concurrent_workers = n;
        info!(previous, max_concurrent_workers = n, "Fleet scaled");
        Ok(())
    }

    /// Merge `patch` into the config. Nothing is applied if the merged config
    /// is invalid.
    pub async fn update_config(&self, patch: FleetConfigPatch) -> FleetResult<()> {
        let mut state = self.inner.state.lock().await;
        let next = state.config.merged(&patch)?;
        info!(config = ?next, "Fleet config updated");
        state.config = next;
        Ok(())
    }

    pub async fn config(&self) -> FleetConfig {
        self.inner.state.lock().await.config.clone()
    }

    pub async fn get_stats(&self) -> FleetStats {
        self.inner.state.lock().await.stats()
    }

    /// Workers currently spawning or active, ordered by worker id.
    pub async fn get_active_workers(&self) -> Vec<WorkerHandle> {
        self.inner.state.lock().await.active_workers()
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Resolve once the batch is terminal.
    pub async fn wait_for_batch(&self, batch_id: BatchId) -> FleetResult<BatchStatusView> {
        loop {
            let notified = self.inner.finished.notified();
            tokio::pin!(notified);
            // register before checking so a finalization in between is not missed
            notified.as_mut().enable();

            let view = self.get_batch_status(batch_id).await?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            notified.await;
        }
    }
}
