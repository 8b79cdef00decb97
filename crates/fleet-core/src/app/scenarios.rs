//! End-to-end dispatcher scenarios against a scripted worker fleet.
//!
//! The scripted executor reads its behavior from the task payload:
//! `mode` ("fail" / "err" / "panic"), `fail_first` (fail attempts below n),
//! `delay_ms`. It records what it saw per task id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rstest::rstest;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::app::{FleetBuilder, FleetDispatcher, FleetStats};
use crate::domain::{
    BatchId, BatchStatus, BatchStatusView, Decider, Decision, DomainEvent, FleetConfig,
    FleetConfigPatch, FleetError, FleetResult, Outcome, Task, TaskId, TaskType, WorkerId,
};
use crate::impls::InMemoryEventSink;
use crate::ports::{ExecutionContext, WorkerExecutor, WorkerLocator};
use crate::typed::handler::fixtures::SquareHandler;
use crate::typed::task::fixtures::Square;
use crate::typed::{TaskKind, TypedRegistry};

#[derive(Default)]
struct Recorder {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: StdMutex<HashMap<TaskId, u32>>,
    timeouts: StdMutex<HashMap<TaskId, Duration>>,
}

impl Recorder {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn calls(&self, task_id: TaskId) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&task_id)
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    fn timeout_of(&self, task_id: TaskId) -> Option<Duration> {
        self.timeouts.lock().unwrap().get(&task_id).copied()
    }
}

struct ScriptedExecutor {
    recorder: Arc<Recorder>,
    /// Executions block on this before resolving, when set.
    release: Option<Arc<Semaphore>>,
}

#[async_trait]
impl WorkerExecutor for ScriptedExecutor {
    async fn execute(&self, task: &Task, ctx: &ExecutionContext) -> FleetResult<Outcome> {
        let running = self.recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.peak.fetch_max(running, Ordering::SeqCst);
        *self
            .recorder
            .calls
            .lock()
            .unwrap()
            .entry(task.id())
            .or_default() += 1;
        self.recorder
            .timeouts
            .lock()
            .unwrap()
            .insert(task.id(), ctx.timeout);

        let delay = task.payload()["delay_ms"].as_u64().unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if let Some(release) = &self.release {
            release.acquire().await.unwrap().forget();
        }
        self.recorder.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fail_first = task.payload()["fail_first"].as_u64().unwrap_or(0) as u32;
        match task.payload()["mode"].as_str() {
            Some("fail") => Ok(Outcome::failure("scripted failure")),
            Some("err") => Err(FleetError::TaskExecution("scripted error".into())),
            Some("panic") => panic!("scripted panic"),
            _ if task.attempt() < fail_first => Ok(Outcome::failure(format!(
                "flaky attempt {}",
                task.attempt()
            ))),
            _ => Ok(Outcome::success_with(json!({ "echo": task.payload() }))),
        }
    }
}

struct ScriptedLocator {
    executor: Arc<ScriptedExecutor>,
    /// The next n `locate` calls fail.
    failures_left: AtomicUsize,
    /// `locate` blocks on this before answering, when set.
    hold: Option<Arc<Semaphore>>,
}

#[async_trait]
impl WorkerLocator for ScriptedLocator {
    async fn locate(&self, _worker_id: WorkerId) -> FleetResult<Arc<dyn WorkerExecutor>> {
        if let Some(hold) = &self.hold {
            hold.acquire().await.unwrap().forget();
        }
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(FleetError::TaskExecution("no capacity".into()));
        }
        let executor: Arc<dyn WorkerExecutor> = self.executor.clone();
        Ok(executor)
    }
}

struct Harness {
    fleet: FleetDispatcher,
    recorder: Arc<Recorder>,
    events: Arc<InMemoryEventSink>,
}

fn config(workers: usize, retry: bool, max_retries: u32) -> FleetConfig {
    FleetConfig {
        max_concurrent_workers: workers,
        retry_failed_tasks: retry,
        max_retries,
        ..FleetConfig::default()
    }
}

fn harness(config: FleetConfig) -> Harness {
    harness_with(config, 0, None)
}

fn harness_with(
    config: FleetConfig,
    locate_failures: usize,
    release: Option<Arc<Semaphore>>,
) -> Harness {
    build_harness(config, locate_failures, release, None, None)
}

/// `locate` waits for a permit on `hold` before answering.
fn harness_with_locate_hold(config: FleetConfig, hold: Arc<Semaphore>) -> Harness {
    build_harness(config, 0, None, Some(hold), None)
}

fn harness_with_decider(config: FleetConfig, decider: Arc<dyn Decider>) -> Harness {
    build_harness(config, 0, None, None, Some(decider))
}

fn build_harness(
    config: FleetConfig,
    locate_failures: usize,
    release: Option<Arc<Semaphore>>,
    hold: Option<Arc<Semaphore>>,
    decider: Option<Arc<dyn Decider>>,
) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let locator = Arc::new(ScriptedLocator {
        executor: Arc::new(ScriptedExecutor {
            recorder: recorder.clone(),
            release,
        }),
        failures_left: AtomicUsize::new(locate_failures),
        hold,
    });
    let events = Arc::new(InMemoryEventSink::new());
    let mut builder = FleetBuilder::new()
        .config(config)
        .locator(locator)
        .event_sink(events.clone());
    if let Some(decider) = decider {
        builder = builder.decider(decider);
    }
    let fleet = builder.build().unwrap();
    Harness {
        fleet,
        recorder,
        events,
    }
}

fn task(payload: Value) -> Task {
    Task::new(TaskType::new("test.scripted.v1"), payload)
}

fn tasks(n: usize, payload: Value) -> Vec<Task> {
    (0..n).map(|_| task(payload.clone())).collect()
}

async fn finish(fleet: &FleetDispatcher, batch_id: BatchId) -> BatchStatusView {
    tokio::time::timeout(Duration::from_secs(5), fleet.wait_for_batch(batch_id))
        .await
        .expect("batch did not finish in time")
        .unwrap()
}

async fn wait_for_stats(
    fleet: &FleetDispatcher,
    what: &str,
    pred: impl Fn(&FleetStats) -> bool,
) -> FleetStats {
    for _ in 0..400 {
        let stats = fleet.get_stats().await;
        if pred(&stats) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

fn status_rank(status: BatchStatus) -> u8 {
    match status {
        BatchStatus::Pending => 0,
        BatchStatus::Processing => 1,
        BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Partial => 2,
    }
}

#[tokio::test]
async fn all_tasks_succeed_on_a_bounded_pool() {
    let h = harness(config(2, true, 3));
    let batch_id = h.fleet.submit_batch(tasks(5, json!({}))).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(view.total_tasks, 5);
    assert_eq!(view.completed_tasks, 5);
    assert_eq!(view.failed_tasks, 0);
    assert_eq!(view.progress, 1.0);
    assert!(view.completed_at.is_some());

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.success && r.value.is_some()));
    assert!(h.recorder.peak() <= 2);

    let stats = h.fleet.get_stats().await;
    assert_eq!(stats.workers_spawned, 5);
    assert_eq!(stats.workers_completed, 5);
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.completed_batches, 1);
    assert!(h.fleet.get_active_workers().await.is_empty());
}

#[tokio::test]
async fn in_flight_work_never_exceeds_the_limit() {
    let h = harness(config(3, true, 3));
    let batch_id = h
        .fleet
        .submit_batch(tasks(10, json!({ "delay_ms": 15 })))
        .await;

    loop {
        let live = h.fleet.get_active_workers().await;
        assert!(live.len() <= 3, "{} live workers", live.len());
        let view = h.fleet.get_batch_status(batch_id).await.unwrap();
        if view.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(3)).await;
    }
    assert_eq!(h.recorder.peak(), 3);
}

#[tokio::test]
async fn status_only_moves_forward_and_counts_stay_consistent() {
    let h = harness(config(2, false, 0));
    let batch = vec![
        task(json!({ "delay_ms": 10 })),
        task(json!({ "delay_ms": 10, "mode": "fail" })),
        task(json!({ "delay_ms": 10 })),
        task(json!({ "delay_ms": 10 })),
    ];
    let batch_id = h.fleet.submit_batch(batch).await;

    let mut last_rank = 0;
    loop {
        let view = h.fleet.get_batch_status(batch_id).await.unwrap();
        let rank = status_rank(view.status);
        assert!(rank >= last_rank, "status went backwards: {:?}", view.status);
        last_rank = rank;
        assert!(view.completed_tasks + view.failed_tasks <= view.total_tasks);
        if view.status.is_terminal() {
            assert_eq!(view.completed_tasks + view.failed_tasks, view.total_tasks);
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn every_task_failing_without_retry_fails_the_batch() {
    let h = harness(config(2, false, 3));
    let batch_id = h
        .fleet
        .submit_batch(tasks(3, json!({ "mode": "fail" })))
        .await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert_eq!(view.completed_tasks, 0);
    assert_eq!(view.failed_tasks, 3);
    assert!(!view.cancelled);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("scripted failure"));
    }
    assert_eq!(h.fleet.get_stats().await.workers_failed, 3);
}

#[tokio::test]
async fn one_failure_makes_the_batch_partial() {
    let h = harness(config(2, false, 3));
    let failing = task(json!({ "mode": "fail" }));
    let failing_id = failing.id();
    let batch = vec![task(json!({})), failing, task(json!({})), task(json!({}))];
    let batch_id = h.fleet.submit_batch(batch).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Partial);
    assert_eq!(view.completed_tasks, 3);
    assert_eq!(view.failed_tasks, 1);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].task_id, failing_id);
}

#[tokio::test]
async fn flaky_task_recovers_within_the_retry_budget() {
    let h = harness(config(2, true, 2));
    let flaky = task(json!({ "fail_first": 2 }));
    let flaky_id = flaky.id();
    let batch_id = h.fleet.submit_batch(vec![flaky]).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(view.total_tasks, 3);
    assert_eq!(view.retried_tasks, 2);
    assert_eq!(view.completed_tasks, 1);
    assert_eq!(view.failed_tasks, 0);
    assert_eq!(view.progress, 1.0);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].task_id, flaky_id);
    assert_eq!(results[0].attempt, 2);
    assert_eq!(h.recorder.calls(flaky_id), 3);

    let decisions = h.fleet.get_batch_decisions(batch_id).await.unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(decisions.iter().all(|d| d.decision == "requeue"));
    assert_eq!(decisions[1].attempt, 1);
    assert_eq!(h.fleet.get_stats().await.tasks_retried, 2);
}

#[tokio::test]
async fn exhausted_retries_record_one_failed_result() {
    let h = harness(config(1, true, 2));
    let stubborn = task(json!({ "fail_first": 10 }));
    let stubborn_id = stubborn.id();
    let batch_id = h.fleet.submit_batch(vec![stubborn]).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert_eq!(view.total_tasks, 3);
    assert_eq!(view.failed_tasks, 1);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    assert_eq!(results.len(), 1);
    let error = results[0].error.as_deref().unwrap();
    assert!(error.contains("retries exhausted"), "{error}");
    assert!(error.contains("after 3 attempts"), "{error}");
    assert!(error.contains("flaky attempt 2"), "{error}");
    assert_eq!(h.recorder.calls(stubborn_id), 3);

    let decisions = h.fleet.get_batch_decisions(batch_id).await.unwrap();
    let kinds: Vec<&str> = decisions.iter().map(|d| d.decision.as_str()).collect();
    assert_eq!(kinds, ["requeue", "requeue", "give_up"]);
}

#[rstest]
#[case::failure_outcome("fail", "scripted failure")]
#[case::executor_error("err", "scripted error")]
#[case::panic("panic", "worker panicked: scripted panic")]
#[tokio::test]
async fn every_failure_shape_becomes_a_failed_result(#[case] mode: &str, #[case] expected: &str) {
    let h = harness(config(1, false, 0));
    let batch_id = h
        .fleet
        .submit_batch(vec![task(json!({ "mode": mode }))])
        .await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    let error = results[0].error.as_deref().unwrap();
    assert!(error.contains(expected), "{error}");
    assert_eq!(h.fleet.get_stats().await.active_workers, 0);
}

#[tokio::test]
async fn locate_failure_is_retried_like_any_other_failure() {
    let h = harness_with(config(1, true, 3), 1, None);
    let batch_id = h.fleet.submit_batch(vec![task(json!({}))]).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(view.retried_tasks, 1);

    let stats = h.fleet.get_stats().await;
    assert_eq!(stats.workers_spawned, 2);
    assert_eq!(stats.workers_failed, 1);
    assert_eq!(stats.workers_completed, 1);
    assert_eq!(stats.active_workers, 0);
}

#[tokio::test]
async fn locate_failure_without_retry_fails_the_task() {
    let h = harness_with(config(1, false, 0), usize::MAX, None);
    let batch_id = h.fleet.submit_batch(tasks(2, json!({}))).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert_eq!(view.failed_tasks, 2);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    let error = results[0].error.as_deref().unwrap();
    assert!(error.contains("unavailable"), "{error}");
    assert!(error.contains("no capacity"), "{error}");
    assert_eq!(results[0].duration_ms, 0);
}

#[tokio::test]
async fn empty_batch_completes_immediately() {
    let h = harness(config(2, true, 3));
    let batch_id = h.fleet.submit_batch(Vec::new()).await;

    let view = h.fleet.get_batch_status(batch_id).await.unwrap();
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(view.total_tasks, 0);
    assert_eq!(view.progress, 1.0);
    assert!(h.fleet.get_batch_results(batch_id).await.unwrap().is_empty());
    assert_eq!(finish(&h.fleet, batch_id).await.status, BatchStatus::Completed);
}

#[tokio::test]
async fn unknown_batch_is_not_found() {
    let h = harness(config(2, true, 3));
    let missing = BatchId::generate();

    assert!(matches!(
        h.fleet.get_batch_status(missing).await,
        Err(FleetError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        h.fleet.get_batch_results(missing).await,
        Err(FleetError::NotFound(_))
    ));
    assert!(matches!(
        h.fleet.get_batch_decisions(missing).await,
        Err(FleetError::NotFound(_))
    ));
    assert!(matches!(
        h.fleet.cancel_batch(missing).await,
        Err(FleetError::NotFound(_))
    ));
    assert!(matches!(
        h.fleet.wait_for_batch(missing).await,
        Err(FleetError::NotFound(_))
    ));
}

#[tokio::test]
async fn cancelled_batch_discards_late_results() {
    let release = Arc::new(Semaphore::new(0));
    let h = harness_with(config(2, true, 3), 0, Some(release.clone()));
    let batch_id = h.fleet.submit_batch(tasks(4, json!({}))).await;

    wait_for_stats(&h.fleet, "two active workers", |s| s.active_workers == 2).await;
    assert!(h.fleet.cancel_batch(batch_id).await.unwrap());
    assert!(!h.fleet.cancel_batch(batch_id).await.unwrap());

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert!(view.cancelled);

    release.add_permits(4);
    let stats = wait_for_stats(&h.fleet, "late results", |s| {
        s.late_results_discarded == 2 && s.live_workers == 0
    })
    .await;
    // remaining backlog was dropped
    assert_eq!(stats.workers_spawned, 2);
    assert_eq!(stats.workers_completed, 2);
    assert_eq!(stats.active_workers, 0);

    let view = h.fleet.get_batch_status(batch_id).await.unwrap();
    assert_eq!(view.status, BatchStatus::Failed);
    assert_eq!(view.completed_tasks, 0);
    assert_eq!(view.failed_tasks, 0);
    assert_eq!(view.total_tasks, 4);
    assert!(h.fleet.get_batch_results(batch_id).await.unwrap().is_empty());

    let events = h.events.events();
    assert!(events.contains(&DomainEvent::BatchCancelled { batch_id }));
    let late = events
        .iter()
        .filter(|e| matches!(e, DomainEvent::LateResultDiscarded { .. }))
        .count();
    assert_eq!(late, 2);
}

#[tokio::test]
async fn worker_located_after_cancel_fails_without_executing() {
    let hold = Arc::new(Semaphore::new(0));
    let h = harness_with_locate_hold(config(1, true, 3), hold.clone());
    let batch_id = h.fleet.submit_batch(tasks(2, json!({}))).await;

    wait_for_stats(&h.fleet, "a spawning worker", |s| s.live_workers == 1).await;
    assert_eq!(h.fleet.get_stats().await.active_workers, 0);
    assert!(h.fleet.cancel_batch(batch_id).await.unwrap());
    hold.add_permits(1);

    let stats = wait_for_stats(&h.fleet, "the located worker to fail", |s| {
        s.live_workers == 0 && s.workers_failed == 1
    })
    .await;
    assert_eq!(stats.workers_spawned, 1);
    assert_eq!(stats.workers_completed, 0);
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.late_results_discarded, 0);
    assert_eq!(h.recorder.total_calls(), 0);

    let view = h.fleet.get_batch_status(batch_id).await.unwrap();
    assert_eq!(view.status, BatchStatus::Failed);
    assert!(view.cancelled);
    assert_eq!(view.completed_tasks, 0);
    assert_eq!(view.failed_tasks, 0);
    assert_eq!(view.total_tasks, 2);
    assert!(h.fleet.get_batch_results(batch_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn executors_see_the_timeout_in_force_when_they_were_dispatched() {
    let cfg = FleetConfig {
        worker_timeout_ms: 1_000,
        ..config(1, false, 0)
    };
    let h = harness(cfg);
    let first = task(json!({ "delay_ms": 40 }));
    let own_timeout = task(json!({})).with_timeout_ms(250);
    let later = task(json!({}));
    let ids = (first.id(), own_timeout.id(), later.id());
    let batch_id = h
        .fleet
        .submit_batch(vec![first, own_timeout, later])
        .await;

    wait_for_stats(&h.fleet, "first worker", |s| s.active_workers == 1).await;
    h.fleet
        .update_config(FleetConfigPatch {
            worker_timeout_ms: Some(2_000),
            ..FleetConfigPatch::default()
        })
        .await
        .unwrap();

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(h.recorder.timeout_of(ids.0), Some(Duration::from_millis(1_000)));
    assert_eq!(h.recorder.timeout_of(ids.1), Some(Duration::from_millis(250)));
    assert_eq!(h.recorder.timeout_of(ids.2), Some(Duration::from_millis(2_000)));
}

#[tokio::test]
async fn last_attempt_number_gives_up_instead_of_overflowing() {
    let raw = json!({
        "id": TaskId::generate(),
        "task_type": "test.scripted.v1",
        "payload": { "mode": "fail" },
        "attempt": u32::MAX
    });
    let worn_out: Task = serde_json::from_value(raw).unwrap();
    let h = harness(config(1, true, 3));
    let batch_id = h.fleet.submit_batch(vec![worn_out]).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert!(!view.cancelled);
    assert_eq!(view.failed_tasks, 1);

    let results = h.fleet.get_batch_results(batch_id).await.unwrap();
    let error = results[0].error.as_deref().unwrap();
    assert!(error.contains("after 4294967295 attempts"), "{error}");
    assert_eq!(h.fleet.get_stats().await.live_workers, 0);
}

struct ExplodingDecider;

impl Decider for ExplodingDecider {
    fn decide(&self, _task: &Task, _config: &FleetConfig, _reason: &str) -> Decision {
        panic!("decider exploded")
    }
}

#[tokio::test]
async fn dying_dispatch_loop_fails_the_batch() {
    let h = harness_with_decider(config(2, true, 3), Arc::new(ExplodingDecider));
    let batch = vec![
        task(json!({ "mode": "fail" })),
        task(json!({ "delay_ms": 200 })),
        task(json!({})),
    ];
    let batch_id = h.fleet.submit_batch(batch).await;

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Failed);
    assert!(!view.cancelled);
    assert!(view.completed_at.is_some());

    let stats = wait_for_stats(&h.fleet, "no live workers", |s| s.live_workers == 0).await;
    assert_eq!(stats.active_workers, 0);
    assert_eq!(stats.failed_batches, 1);

    let events = h.events.events();
    assert!(events.iter().any(|e| matches!(
        e,
        DomainEvent::BatchAborted { batch_id: id, reason } if *id == batch_id && reason.contains("panicked")
    )));
    assert!(matches!(
        events.last(),
        Some(DomainEvent::BatchFinalized {
            status: BatchStatus::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn scaling_to_zero_is_rejected_and_changes_nothing() {
    let h = harness(config(4, true, 3));

    let err = h.fleet.scale_workers(0).await.unwrap_err();
    assert!(matches!(err, FleetError::Validation(_)));
    assert_eq!(h.fleet.config().await.max_concurrent_workers, 4);

    h.fleet.scale_workers(7).await.unwrap();
    assert_eq!(h.fleet.config().await.max_concurrent_workers, 7);
    assert_eq!(h.fleet.get_stats().await.max_concurrent_workers, 7);
}

#[tokio::test]
async fn scaling_up_mid_batch_widens_the_pool() {
    let h = harness(config(1, true, 3));
    let batch_id = h
        .fleet
        .submit_batch(tasks(6, json!({ "delay_ms": 30 })))
        .await;

    wait_for_stats(&h.fleet, "first worker", |s| s.active_workers == 1).await;
    h.fleet.scale_workers(3).await.unwrap();

    let view = finish(&h.fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!(h.recorder.peak(), 3);
}

#[tokio::test]
async fn config_patch_is_validated_before_it_applies() {
    let h = harness(config(2, true, 3));

    let bad = FleetConfigPatch {
        max_concurrent_workers: Some(0),
        max_retries: Some(9),
        ..FleetConfigPatch::default()
    };
    assert!(matches!(
        h.fleet.update_config(bad).await,
        Err(FleetError::Validation(_))
    ));
    assert_eq!(h.fleet.config().await, config(2, true, 3));

    let good = FleetConfigPatch {
        retry_failed_tasks: Some(false),
        worker_timeout_ms: Some(1_000),
        ..FleetConfigPatch::default()
    };
    h.fleet.update_config(good).await.unwrap();
    let current = h.fleet.config().await;
    assert!(!current.retry_failed_tasks);
    assert_eq!(current.worker_timeout_ms, 1_000);
    assert_eq!(current.max_concurrent_workers, 2);
}

#[tokio::test]
async fn events_trace_the_batch_lifecycle() {
    let h = harness(config(2, true, 3));
    let batch_id = h.fleet.submit_batch(tasks(3, json!({}))).await;
    finish(&h.fleet, batch_id).await;

    let events = h.events.events();
    assert_eq!(
        events.first(),
        Some(&DomainEvent::BatchSubmitted {
            batch_id,
            total_tasks: 3
        })
    );
    assert!(matches!(
        events.last(),
        Some(DomainEvent::BatchFinalized {
            status: BatchStatus::Completed,
            completed_tasks: 3,
            ..
        })
    ));
    let spawned = events
        .iter()
        .filter(|e| e.name() == "worker_spawned")
        .count();
    assert_eq!(spawned, 3);
    assert!(events.iter().all(|e| e.batch_id() == batch_id));
}

#[tokio::test]
async fn snapshot_holds_every_batch() {
    let h = harness(config(2, true, 3));
    let first = h.fleet.submit_batch(tasks(1, json!({}))).await;
    let second = h.fleet.submit_batch(Vec::new()).await;
    finish(&h.fleet, first).await;

    let snapshot = h.fleet.snapshot().await;
    let ids: Vec<BatchId> = snapshot.batches.iter().map(|b| b.batch_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first) && ids.contains(&second));
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(snapshot.counters.batches_submitted, 2);
    assert!(snapshot.workers.is_empty());
    assert!(serde_json::to_value(&snapshot).is_ok());
}

#[tokio::test]
async fn registry_fleet_runs_typed_handlers() {
    let mut registry = TypedRegistry::new();
    registry.register::<Square, _>(SquareHandler).unwrap();
    let fleet = FleetBuilder::new()
        .config(config(2, false, 0))
        .registry(registry)
        .build()
        .unwrap();

    let batch = vec![
        Square { value: 3 }.into_task().unwrap(),
        Square { value: 4 }.into_task().unwrap(),
        Task::new(TaskType::new("test.unknown.v1"), json!({})),
    ];
    let batch_id = fleet.submit_batch(batch).await;

    let view = finish(&fleet, batch_id).await;
    assert_eq!(view.status, BatchStatus::Partial);

    let results = fleet.get_batch_results(batch_id).await.unwrap();
    let mut squares: Vec<i64> = results
        .iter()
        .filter_map(|r| r.value.as_ref().and_then(Value::as_i64))
        .collect();
    squares.sort_unstable();
    assert_eq!(squares, [9, 16]);

    let failed = results.iter().find(|r| !r.success).unwrap();
    assert!(
        failed
            .error
            .as_deref()
            .unwrap()
            .contains("handler not found for task_type=test.unknown.v1")
    );
}
