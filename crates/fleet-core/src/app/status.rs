//! Status - 読み取り専用のビュー
//!
//! `FleetStats` は get_stats() の集計、`FleetSnapshot` はホストが永続化する
//! 状態全体（batch, live worker, 設定, カウンタ）。

use serde::{Deserialize, Serialize};

use crate::domain::{BatchRecord, FleetConfig, WorkerHandle};

use super::state::FleetCounters;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStats {
    /// Workers in `active` state right now.
    pub active_workers: usize,
    /// Workers spawning or active.
    pub live_workers: usize,
    pub max_concurrent_workers: usize,

    pub total_batches: usize,
    pub pending_batches: usize,
    pub processing_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub partial_batches: usize,

    pub workers_spawned: u64,
    pub workers_completed: u64,
    pub workers_failed: u64,

    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_retried: u64,
    pub late_results_discarded: u64,
}

/// Everything a host runtime needs to persist for one dispatcher instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub config: FleetConfig,
    /// Sorted by batch id.
    pub batches: Vec<BatchRecord>,
    pub workers: Vec<WorkerHandle>,
    pub counters: FleetCounters,
}
