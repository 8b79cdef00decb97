//! FleetState - ディスパッチャが排他的に所有する状態
//!
//! batch と worker のマップ、設定、集計カウンタを 1 つの集約にまとめ、
//! ディスパッチャの Mutex の内側にだけ置く。ここのメソッドはすべて同期で、
//! ロックを握ったまま await しない前提で呼ばれる。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BatchId, BatchRecord, BatchStatus, FleetConfig, FleetError, FleetResult, WorkerHandle,
    WorkerId, WorkerStatus,
};

use super::status::{FleetSnapshot, FleetStats};

/// Aggregate counters kept across all batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetCounters {
    /// Workers currently `active`. Informational only.
    pub active_workers: usize,
    pub batches_submitted: u64,
    pub workers_spawned: u64,
    pub workers_completed: u64,
    pub workers_failed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_retried: u64,
    pub late_results_discarded: u64,
}

pub(crate) struct FleetState {
    pub(crate) config: FleetConfig,
    pub(crate) batches: HashMap<BatchId, BatchRecord>,
    /// Live (spawning/active) workers only.
    pub(crate) workers: HashMap<WorkerId, WorkerHandle>,
    pub(crate) counters: FleetCounters,
}

impl FleetState {
    pub(crate) fn new(config: FleetConfig) -> Self {
        Self {
            config,
            batches: HashMap::new(),
            workers: HashMap::new(),
            counters: FleetCounters::default(),
        }
    }

    pub(crate) fn batch(&self, batch_id: BatchId) -> FleetResult<&BatchRecord> {
        self.batches
            .get(&batch_id)
            .ok_or(FleetError::NotFound(batch_id))
    }

    pub(crate) fn batch_mut(&mut self, batch_id: BatchId) -> FleetResult<&mut BatchRecord> {
        self.batches
            .get_mut(&batch_id)
            .ok_or(FleetError::NotFound(batch_id))
    }

    /// Unknown batches count as terminal: nothing more may be dispatched.
    pub(crate) fn is_batch_terminal(&self, batch_id: BatchId) -> bool {
        self.batches
            .get(&batch_id)
            .is_none_or(BatchRecord::is_terminal)
    }

    pub(crate) fn spawn_worker(&mut self, handle: WorkerHandle) {
        if let Some(batch) = self.batches.get_mut(&handle.batch_id) {
            batch.add_worker(handle.id);
        }
        self.counters.workers_spawned += 1;
        self.workers.insert(handle.id, handle);
    }

    /// Spawning -> Active. Bumps the active counter.
    pub(crate) fn activate_worker(&mut self, worker_id: WorkerId) {
        if let Some(handle) = self.workers.get_mut(&worker_id)
            && handle.activate()
        {
            self.counters.active_workers += 1;
        }
    }

    /// Terminal transition. The handle leaves the live map; only the counters
    /// remember it.
    pub(crate) fn finish_worker(&mut self, worker_id: WorkerId, success: bool, now: DateTime<Utc>) {
        let Some(mut handle) = self.workers.remove(&worker_id) else {
            return;
        };
        let Some(previous) = handle.finish(success, now) else {
            return;
        };
        if previous == WorkerStatus::Active {
            self.counters.active_workers = self.counters.active_workers.saturating_sub(1);
        }
        if success {
            self.counters.workers_completed += 1;
        } else {
            self.counters.workers_failed += 1;
        }
    }

    /// Fail every live worker of `batch_id`. Returns how many were failed.
    pub(crate) fn fail_batch_workers(&mut self, batch_id: BatchId, now: DateTime<Utc>) -> usize {
        let ids: Vec<WorkerId> = self
            .workers
            .values()
            .filter(|h| h.batch_id == batch_id)
            .map(|h| h.id)
            .collect();
        for worker_id in &ids {
            self.finish_worker(*worker_id, false, now);
        }
        ids.len()
    }

    pub(crate) fn active_workers(&self) -> Vec<WorkerHandle> {
        let mut handles: Vec<WorkerHandle> = self.workers.values().cloned().collect();
        handles.sort_by_key(|h| h.id);
        handles
    }

    pub(crate) fn stats(&self) -> FleetStats {
        let mut stats = FleetStats {
            active_workers: self.counters.active_workers,
            live_workers: self.workers.len(),
            max_concurrent_workers: self.config.max_concurrent_workers,
            total_batches: self.batches.len(),
            workers_spawned: self.counters.workers_spawned,
            workers_completed: self.counters.workers_completed,
            workers_failed: self.counters.workers_failed,
            tasks_succeeded: self.counters.tasks_succeeded,
            tasks_failed: self.counters.tasks_failed,
            tasks_retried: self.counters.tasks_retried,
            late_results_discarded: self.counters.late_results_discarded,
            ..FleetStats::default()
        };
        for batch in self.batches.values() {
            match batch.status {
                BatchStatus::Pending => stats.pending_batches += 1,
                BatchStatus::Processing => stats.processing_batches += 1,
                BatchStatus::Completed => stats.completed_batches += 1,
                BatchStatus::Failed => stats.failed_batches += 1,
                BatchStatus::Partial => stats.partial_batches += 1,
            }
        }
        stats
    }

    pub(crate) fn snapshot(&self) -> FleetSnapshot {
        let mut batches: Vec<BatchRecord> = self.batches.values().cloned().collect();
        batches.sort_by_key(|b| b.batch_id);
        FleetSnapshot {
            config: self.config.clone(),
            batches,
            workers: self.active_workers(),
            counters: self.counters.clone(),
        }
    }
}
