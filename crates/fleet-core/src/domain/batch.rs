//! Batch record and status management.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::DecisionRecord;
use super::ids::{BatchId, WorkerId};
use super::result::TaskResult;

/// Batch status.
///
/// State transitions (forward only):
/// - Pending -> Processing -> Completed | Failed | Partial
/// - Pending | Processing -> Failed (cancelled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    /// Every task succeeded.
    Completed,
    /// No task succeeded (or the batch was cancelled).
    Failed,
    /// Some tasks succeeded, some failed.
    Partial,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Partial
        )
    }

    /// Terminal status as a pure function of the final counts.
    pub fn terminal_for(completed: usize, failed: usize) -> Self {
        if failed == 0 {
            BatchStatus::Completed
        } else if completed == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }
}

/// Batch record: the aggregate tracked for one submitted batch.
///
/// Design:
/// - Single source of truth for the batch (owned by the dispatcher state).
/// - State transitions via methods, never direct field writes from outside.
/// - Once terminal, every mutating method is a no-op that reports `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Admitted task attempts. Grows by one per admitted retry.
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// Attempts that failed and were superseded by a retry.
    pub retried_tasks: usize,

    /// Final task results, in completion order.
    pub results: Vec<TaskResult>,
    pub worker_ids: BTreeSet<WorkerId>,
    pub decisions: Vec<DecisionRecord>,

    pub cancelled: bool,
}

impl BatchRecord {
    pub fn new(batch_id: BatchId, total_tasks: usize, now: DateTime<Utc>) -> Self {
        Self {
            batch_id,
            status: BatchStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            total_tasks,
            completed_tasks: 0,
            failed_tasks: 0,
            retried_tasks: 0,
            results: Vec::new(),
            worker_ids: BTreeSet::new(),
            decisions: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending -> Processing.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Pending {
            return false;
        }
        self.status = BatchStatus::Processing;
        self.started_at = Some(now);
        true
    }

    pub fn add_worker(&mut self, worker_id: WorkerId) {
        self.worker_ids.insert(worker_id);
    }

    /// Attempts that no longer need dispatching: final results plus retried
    /// attempts (each of which was replaced by a new admitted attempt).
    pub fn resolved_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks + self.retried_tasks
    }

    pub fn progress(&self) -> f64 {
        if self.total_tasks == 0 {
            return 1.0;
        }
        self.resolved_tasks() as f64 / self.total_tasks as f64
    }

    /// Record a final result. Returns `false` (and records nothing) when the
    /// batch is already terminal.
    pub fn record_result(&mut self, result: TaskResult) -> bool {
        if self.is_terminal() {
            return false;
        }
        if result.success {
            self.completed_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }
        self.results.push(result);
        true
    }

    /// Account for a failed attempt that is being re-admitted as a new task.
    pub fn record_retry(&mut self, decision: DecisionRecord) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.retried_tasks += 1;
        self.total_tasks += 1;
        self.decisions.push(decision);
        true
    }

    /// Decision log entry that does not change counts (e.g. a give-up verdict).
    pub fn record_decision(&mut self, decision: DecisionRecord) {
        if !self.is_terminal() {
            self.decisions.push(decision);
        }
    }

    /// Finalize if every admitted attempt is resolved. Idempotent: returns the
    /// new status only on the call that performs the transition.
    pub fn try_finalize(&mut self, now: DateTime<Utc>) -> Option<BatchStatus> {
        if self.status != BatchStatus::Processing || self.resolved_tasks() != self.total_tasks {
            return None;
        }
        let status = BatchStatus::terminal_for(self.completed_tasks, self.failed_tasks);
        self.status = status;
        self.completed_at = Some(now);
        Some(status)
    }

    /// Mark the batch terminal (failed) right away. Returns `false` when it
    /// was already terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = BatchStatus::Failed;
        self.cancelled = true;
        self.completed_at = Some(now);
        true
    }

    /// Force `failed` after the dispatch loop died. Unlike [`cancel`](Self::cancel)
    /// the batch is not marked as cancelled. Returns `false` when it was
    /// already terminal.
    pub fn abort(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = BatchStatus::Failed;
        self.completed_at = Some(now);
        true
    }

    pub fn status_view(&self) -> BatchStatusView {
        BatchStatusView {
            batch_id: self.batch_id,
            status: self.status,
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            retried_tasks: self.retried_tasks,
            progress: self.progress(),
            cancelled: self.cancelled,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Batch status for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatusView {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub retried_tasks: usize,
    pub progress: f64,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
