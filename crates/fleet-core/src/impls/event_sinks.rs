//! EventSink implementations.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::domain::DomainEvent;
use crate::ports::EventSink;

/// Logs every event through `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match &event {
            DomainEvent::BatchSubmitted {
                batch_id,
                total_tasks,
            } => {
                info!(batch_id = %batch_id, total_tasks, "Batch submitted");
            }
            DomainEvent::WorkerSpawned {
                batch_id,
                worker_id,
                task_id,
                attempt,
            } => {
                debug!(
                    batch_id = %batch_id,
                    worker_id = %worker_id,
                    task_id = %task_id,
                    attempt,
                    "Worker spawned"
                );
            }
            DomainEvent::TaskSucceeded {
                batch_id,
                task_id,
                attempt,
                duration_ms,
            } => {
                debug!(
                    batch_id = %batch_id,
                    task_id = %task_id,
                    attempt,
                    duration_ms,
                    "Task succeeded"
                );
            }
            DomainEvent::TaskRequeued {
                batch_id,
                task_id,
                next_attempt,
                reason,
            } => {
                warn!(
                    batch_id = %batch_id,
                    task_id = %task_id,
                    next_attempt,
                    reason = %reason,
                    "Task requeued"
                );
            }
            DomainEvent::TaskFailed {
                batch_id,
                task_id,
                attempt,
                error,
            } => {
                warn!(
                    batch_id = %batch_id,
                    task_id = %task_id,
                    attempt,
                    error = %error,
                    "Task failed"
                );
            }
            DomainEvent::LateResultDiscarded {
                batch_id,
                task_id,
                worker_id,
            } => {
                debug!(
                    batch_id = %batch_id,
                    task_id = %task_id,
                    worker_id = %worker_id,
                    "Late result discarded"
                );
            }
            DomainEvent::BatchFinalized {
                batch_id,
                status,
                completed_tasks,
                failed_tasks,
            } => {
                info!(
                    batch_id = %batch_id,
                    status = ?status,
                    completed_tasks,
                    failed_tasks,
                    "Batch finalized"
                );
            }
            DomainEvent::BatchCancelled { batch_id } => {
                info!(batch_id = %batch_id, "Batch cancelled");
            }
            DomainEvent::BatchAborted { batch_id, reason } => {
                error!(batch_id = %batch_id, reason = %reason, "Batch aborted");
            }
        }
    }
}

/// Keeps every emitted event in memory, in emission order.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: DomainEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
