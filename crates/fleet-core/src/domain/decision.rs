//! Decision model: what happens to a task after a failed attempt.
//!
//! This module defines the Decision type (what to do next) and the Decider trait
//! (how to decide it from the task and the current config).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::FleetConfig;
use super::ids::TaskId;
use super::task::Task;

/// The next action for a task whose attempt just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Re-admit `next` into the live backlog, with no delay.
    Requeue { next: Task, reason: String },

    /// The failure is final.
    ///
    /// `exhausted` is set when retries were enabled but the attempt budget is
    /// used up, as opposed to retries being switched off.
    GiveUp { reason: String, exhausted: bool },
}

/// Trait for deciding the next action after a failed attempt.
///
/// Deciders are pure functions: given the task and the config in effect they
/// return the next action without side effects. The dispatcher applies it.
pub trait Decider: Send + Sync {
    fn decide(&self, task: &Task, config: &FleetConfig, reason: &str) -> Decision;
}

/// Default decider.
///
/// - `retry_failed_tasks = false` -> give up
/// - `attempt >= max_retries` -> give up (exhausted)
/// - otherwise -> requeue `task.next_attempt()` immediately (no backoff)
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    pub const NAME: &'static str = "retry_policy";
}

impl Decider for RetryPolicy {
    fn decide(&self, task: &Task, config: &FleetConfig, reason: &str) -> Decision {
        if !config.retry_failed_tasks {
            return Decision::GiveUp {
                reason: reason.to_string(),
                exhausted: false,
            };
        }
        if task.attempt() >= config.max_retries {
            return Decision::GiveUp {
                reason: reason.to_string(),
                exhausted: true,
            };
        }
        Decision::Requeue {
            next: task.next_attempt(),
            reason: format!(
                "retry {}/{} after: {reason}",
                task.attempt().saturating_add(1),
                config.max_retries
            ),
        }
    }
}

/// A decision made for a task, kept on the batch for later explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: TaskId,

    /// Attempt whose failure triggered the decision.
    pub attempt: u32,

    /// Which policy made the decision (e.g. "retry_policy").
    pub policy: String,

    /// What was decided ("requeue" / "give_up").
    pub decision: String,

    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn requeue(
        task_id: TaskId,
        attempt: u32,
        reason: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            policy: RetryPolicy::NAME.to_string(),
            decision: "requeue".to_string(),
            reason: reason.into(),
            decided_at,
        }
    }

    pub fn give_up(
        task_id: TaskId,
        attempt: u32,
        reason: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            policy: RetryPolicy::NAME.to_string(),
            decision: "give_up".to_string(),
            reason: reason.into(),
            decided_at,
        }
    }
}
