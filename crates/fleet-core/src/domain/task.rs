use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One unit of work handed to a worker.
///
/// Immutable once built. A retry is a new value produced by [`Task::next_attempt`]:
/// same `id`, `attempt + 1`.
///
/// `priority` is carried for callers and executors but the dispatcher does not
/// consult it; dispatch order is submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    task_type: TaskType,
    payload: serde_json::Value,
    #[serde(default)]
    attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

impl Task {
    pub fn new(task_type: TaskType, payload: serde_json::Value) -> Self {
        Self::with_id(TaskId::generate(), task_type, payload)
    }

    pub fn with_id(id: TaskId, task_type: TaskType, payload: serde_json::Value) -> Self {
        Self {
            id,
            task_type,
            payload,
            attempt: 0,
            priority: None,
            timeout_ms: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// The value re-admitted to the backlog when this attempt is retried.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Zero for the first attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }
}
