//! DispatchLoop - 1 batch 分のタスクを bounded pool で流す
//!
//! # ループ
//! 1. 空き枠がある間 backlog から取り出して worker を起動
//! 2. 最初に終わった 1 件を待つ
//! 3. 結果を記録（成功 / リトライ / 最終失敗）し、1 に戻る
//!
//! backlog はこのループだけが所有する。リトライは同じ backlog の末尾に戻る。
//! batch が終端（キャンセル）になったら新規起動を止め、in-flight だけ排出する。
//!
//! ループ本体は `supervise` の子タスクとして動く。ループが panic で落ちたら
//! batch を failed に倒し、待っている呼び出し側を起こす。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, error, info, warn};

use crate::domain::{
    BatchId, Decision, DecisionRecord, DomainEvent, FleetError, Task, TaskResult, WorkerHandle,
};
use crate::ports::ExecutionContext;

use super::dispatcher::Inner;
use super::gate::{AttemptOutcome, ConcurrencyGate, Resolution};

/// Run [`drive_batch`] as a child task and force the batch terminal if it
/// dies before finalizing.
pub(crate) async fn supervise(inner: Arc<Inner>, batch_id: BatchId, tasks: Vec<Task>) {
    let driver = tokio::spawn(drive_batch(Arc::clone(&inner), batch_id, tasks).in_current_span());
    if let Err(err) = driver.await {
        let reason = if err.is_panic() {
            "dispatch loop panicked".to_string()
        } else {
            "dispatch loop was cancelled".to_string()
        };
        abort_batch(&inner, batch_id, reason).await;
    }
}

async fn abort_batch(inner: &Arc<Inner>, batch_id: BatchId, reason: String) {
    let now = inner.clock.now();
    let aborted = {
        let mut state = inner.state.lock().await;
        let failed_workers = state.fail_batch_workers(batch_id, now);
        match state.batch_mut(batch_id) {
            Ok(batch) => {
                if batch.abort(now) {
                    error!(failed_workers, reason = %reason, "Batch aborted");
                    inner.events.emit(DomainEvent::BatchAborted {
                        batch_id,
                        reason,
                    });
                    inner.announce_final(batch);
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    };
    if aborted {
        inner.finished.notify_waiters();
    }
}

async fn drive_batch(inner: Arc<Inner>, batch_id: BatchId, tasks: Vec<Task>) {
    let mut backlog: VecDeque<Task> = tasks.into();
    let mut gate = ConcurrencyGate::new();
    info!(tasks = backlog.len(), "Dispatch loop started");

    loop {
        // fill free slots
        while !backlog.is_empty() {
            let limit = {
                let state = inner.state.lock().await;
                if state.is_batch_terminal(batch_id) {
                    debug!(dropped = backlog.len(), "Batch is terminal, dropping backlog");
                    backlog.clear();
                    break;
                }
                state.config.max_concurrent_workers
            };
            if !gate.has_capacity(limit) {
                break;
            }
            let Some(task) = backlog.pop_front() else {
                break;
            };
            dispatch_one(&inner, batch_id, task, &mut gate, &mut backlog).await;
        }

        if gate.is_empty() {
            if backlog.is_empty() {
                break;
            }
            continue;
        }

        if let Some(resolution) = gate.next_resolved().await {
            settle(&inner, batch_id, resolution, &mut backlog).await;
        }
    }

    let now = inner.clock.now();
    let finished = {
        let mut state = inner.state.lock().await;
        match state.batch_mut(batch_id) {
            Ok(batch) => {
                if let Some(status) = batch.try_finalize(now) {
                    inner.announce_final(batch);
                    Some(status)
                } else if !batch.is_terminal() {
                    warn!(
                        total = batch.total_tasks,
                        resolved = batch.resolved_tasks(),
                        "Dispatch loop ended with unresolved tasks"
                    );
                    None
                } else {
                    None
                }
            }
            Err(err) => {
                warn!(error = %err, "Batch vanished while dispatching");
                None
            }
        }
    };
    if finished.is_some() {
        inner.finished.notify_waiters();
    }
    info!("Dispatch loop finished");
}

/// Spawn one worker for `task`: commit the handle, locate an executor, then
/// start the execution inside the gate.
async fn dispatch_one(
    inner: &Arc<Inner>,
    batch_id: BatchId,
    task: Task,
    gate: &mut ConcurrencyGate,
    backlog: &mut VecDeque<Task>,
) {
    let worker_id = inner.ids.generate_worker_id();
    let now = inner.clock.now();

    let default_timeout_ms = {
        let mut state = inner.state.lock().await;
        state.spawn_worker(WorkerHandle::spawning(
            worker_id,
            batch_id,
            task.id(),
            task.attempt(),
            now,
        ));
        state.config.worker_timeout_ms
    };
    inner.events.emit(DomainEvent::WorkerSpawned {
        batch_id,
        worker_id,
        task_id: task.id(),
        attempt: task.attempt(),
    });

    let ctx = ExecutionContext {
        batch_id,
        worker_id,
        timeout: Duration::from_millis(task.timeout_ms().unwrap_or(default_timeout_ms)),
    };

    match inner.locator.locate(worker_id).await {
        Ok(executor) => {
            let mut state = inner.state.lock().await;
            if state.is_batch_terminal(batch_id) {
                // cancelled while locating
                state.finish_worker(worker_id, false, inner.clock.now());
                debug!(%worker_id, task_id = %task.id(), "Batch went terminal before start");
                return;
            }
            state.activate_worker(worker_id);
            drop(state);
            debug!(%worker_id, task_id = %task.id(), attempt = task.attempt(), "Worker active");
            gate.start(task, worker_id, executor, ctx);
        }
        Err(err) => {
            let reason = FleetError::WorkerUnavailable {
                worker_id,
                reason: err.to_string(),
            }
            .to_string();
            warn!(%worker_id, task_id = %task.id(), error = %reason, "Worker could not be located");
            let resolution = Resolution {
                task,
                worker_id,
                duration: Duration::ZERO,
                outcome: AttemptOutcome::Failed(reason),
            };
            settle(inner, batch_id, resolution, backlog).await;
        }
    }
}

/// Record one resolved attempt against the batch.
async fn settle(
    inner: &Arc<Inner>,
    batch_id: BatchId,
    resolution: Resolution,
    backlog: &mut VecDeque<Task>,
) {
    let Resolution {
        task,
        worker_id,
        duration,
        outcome,
    } = resolution;
    let now = inner.clock.now();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let mut guard = inner.state.lock().await;
    let state = &mut *guard;
    state.finish_worker(worker_id, outcome.is_success(), now);

    let Some(batch) = state.batches.get_mut(&batch_id).filter(|b| !b.is_terminal()) else {
        state.counters.late_results_discarded += 1;
        inner.events.emit(DomainEvent::LateResultDiscarded {
            batch_id,
            task_id: task.id(),
            worker_id,
        });
        return;
    };

    match outcome {
        AttemptOutcome::Succeeded(value) => {
            batch.record_result(TaskResult::succeeded(
                task.id(),
                task.attempt(),
                worker_id,
                value,
                duration_ms,
                now,
            ));
            state.counters.tasks_succeeded += 1;
            inner.events.emit(DomainEvent::TaskSucceeded {
                batch_id,
                task_id: task.id(),
                attempt: task.attempt(),
                duration_ms,
            });
        }
        AttemptOutcome::Failed(reason) => {
            match inner.decider.decide(&task, &state.config, &reason) {
                Decision::Requeue { next, reason } => {
                    batch.record_retry(DecisionRecord::requeue(
                        task.id(),
                        task.attempt(),
                        reason.clone(),
                        now,
                    ));
                    state.counters.tasks_retried += 1;
                    inner.events.emit(DomainEvent::TaskRequeued {
                        batch_id,
                        task_id: next.id(),
                        next_attempt: next.attempt(),
                        reason,
                    });
                    backlog.push_back(next);
                }
                Decision::GiveUp { reason, exhausted } => {
                    let error = if exhausted {
                        FleetError::RetryExhausted {
                            task_id: task.id(),
                            attempts: task.attempt().saturating_add(1),
                            reason,
                        }
                        .to_string()
                    } else {
                        reason
                    };
                    batch.record_decision(DecisionRecord::give_up(
                        task.id(),
                        task.attempt(),
                        error.clone(),
                        now,
                    ));
                    batch.record_result(TaskResult::failed(
                        task.id(),
                        task.attempt(),
                        worker_id,
                        error.clone(),
                        duration_ms,
                        now,
                    ));
                    state.counters.tasks_failed += 1;
                    inner.events.emit(DomainEvent::TaskFailed {
                        batch_id,
                        task_id: task.id(),
                        attempt: task.attempt(),
                        error,
                    });
                }
            }
        }
    }

    if batch.try_finalize(now).is_some() {
        inner.announce_final(batch);
        drop(guard);
        inner.finished.notify_waiters();
    }
}
