use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use batch_lite::scheduler::{
    CompletionSink, JobQueue, JobRecord, JobStatus, Scheduler, SchedulingPolicy,
};
use batch_lite::worker::{Dispatcher, ExecutionError, JobExecutor, SimulatedExecutor};

/// Sink that records every reported job for inspection.
#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(String, JobStatus)>>,
}

impl RecordingSink {
    fn reports(&self) -> Vec<(String, JobStatus)> {
        self.reports.lock().unwrap().clone()
    }
}

impl CompletionSink for RecordingSink {
    fn register_completion(&self, job: &JobRecord) {
        self.reports
            .lock()
            .unwrap()
            .push((job.name().to_string(), job.status()));
    }
}

/// Executor that fails every job.
struct FailingExecutor;

impl JobExecutor for FailingExecutor {
    async fn execute(&self, _job: &JobRecord) -> Result<(), ExecutionError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(ExecutionError::NonZeroExit(Some(1)))
    }
}

/// Executor that tracks how many jobs run at once.
struct ConcurrencyCounter {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

impl ConcurrencyCounter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        })
    }
}

/// Local wrapper so the foreign `JobExecutor` trait can be implemented
/// for a shared `ConcurrencyCounter` without violating the orphan rule.
struct SharedCounter(Arc<ConcurrencyCounter>);

impl JobExecutor for SharedCounter {
    async fn execute(&self, _job: &JobRecord) -> Result<(), ExecutionError> {
        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(std::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn dispatcher_completes_all_submitted_jobs() {
    let queue = Arc::new(JobQueue::new());
    let scheduler = Arc::new(Scheduler::new(queue.clone()));
    let token = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        queue.clone(),
        SimulatedExecutor,
        scheduler.clone(),
        token.clone(),
    );
    let handle = tokio::spawn(dispatcher.run());

    for name in ["a", "b", "c"] {
        scheduler
            .submit_job(name, Duration::from_millis(10), 0)
            .await
            .unwrap();
    }

    wait_for("all jobs to complete", || {
        scheduler.performance_stats().completed_jobs == 3
    })
    .await;
    assert!(queue.is_empty());
    assert_eq!(scheduler.performance_stats().failed_jobs, 0);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn execution_failure_fails_the_job_and_the_loop_survives() {
    let queue = Arc::new(JobQueue::new());
    let sink = Arc::new(RecordingSink::default());
    let token = CancellationToken::new();

    let dispatcher = Dispatcher::new(queue.clone(), FailingExecutor, sink.clone(), token.clone());
    let handle = tokio::spawn(dispatcher.run());

    queue
        .add(JobRecord::new("doomed_1", Duration::from_millis(5), 0))
        .await
        .unwrap();
    queue
        .add(JobRecord::new("doomed_2", Duration::from_millis(5), 0))
        .await
        .unwrap();

    wait_for("both failures to be reported", || sink.reports().len() == 2).await;
    assert!(!handle.is_finished(), "dispatcher must survive failures");

    for (name, status) in sink.reports() {
        assert_eq!(status, JobStatus::Failed, "{name} should have failed");
    }

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn at_most_one_job_runs_at_any_instant() {
    let queue = Arc::new(JobQueue::new());
    let sink = Arc::new(RecordingSink::default());
    let token = CancellationToken::new();
    let counter = ConcurrencyCounter::new();

    let dispatcher = Dispatcher::new(
        queue.clone(),
        SharedCounter(counter.clone()),
        sink.clone(),
        token.clone(),
    );
    let handle = tokio::spawn(dispatcher.run());

    for i in 0..5 {
        queue
            .add(JobRecord::new(
                format!("burst_{i}"),
                Duration::from_millis(10),
                0,
            ))
            .await
            .unwrap();
    }

    wait_for("all five jobs to finish", || sink.reports().len() == 5).await;
    assert_eq!(
        counter.max_seen.load(Ordering::SeqCst),
        1,
        "only one job may ever run at a time"
    );

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn current_job_is_visible_while_running() {
    let queue = Arc::new(JobQueue::new());
    let scheduler = Arc::new(Scheduler::new(queue.clone()));
    let token = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        queue.clone(),
        SimulatedExecutor,
        scheduler.clone(),
        token.clone(),
    );
    let current = dispatcher.current_job();
    let handle = tokio::spawn(dispatcher.run());

    assert!(current.get().is_none());
    scheduler
        .submit_job("visible", Duration::from_millis(200), 0)
        .await
        .unwrap();

    wait_for("the job to start", || current.get().is_some()).await;
    let running = current.get().unwrap();
    assert_eq!(running.name(), "visible");
    assert_eq!(running.status(), JobStatus::Running);
    assert!(running.start_time().is_some());

    wait_for("the job to finish", || current.get().is_none()).await;
    assert_eq!(scheduler.performance_stats().completed_jobs, 1);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_lets_the_in_flight_job_finish() {
    let queue = Arc::new(JobQueue::new());
    let scheduler = Arc::new(Scheduler::new(queue.clone()));
    let token = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        queue.clone(),
        SimulatedExecutor,
        scheduler.clone(),
        token.clone(),
    );
    let current = dispatcher.current_job();
    let handle = tokio::spawn(dispatcher.run());

    scheduler
        .submit_job("finisher", Duration::from_millis(100), 0)
        .await
        .unwrap();
    wait_for("the job to start", || current.get().is_some()).await;

    // Cancel mid-execution: the job must still complete before the loop exits.
    token.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    let stats = scheduler.performance_stats();
    assert_eq!(stats.completed_jobs, 1, "in-flight job must finish");
}

#[tokio::test]
async fn queue_closure_stops_the_dispatcher() {
    let queue = Arc::new(JobQueue::new());
    let sink = Arc::new(RecordingSink::default());
    let token = CancellationToken::new();

    let dispatcher = Dispatcher::new(queue.clone(), SimulatedExecutor, sink, token);
    let handle = tokio::spawn(dispatcher.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.close();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("dispatcher did not observe queue closure")
        .unwrap();
}

#[tokio::test]
async fn end_to_end_policy_switch_affects_dispatch_order() {
    let queue = Arc::new(JobQueue::new());
    let scheduler = Arc::new(Scheduler::new(queue.clone()));
    let sink = Arc::new(RecordingSink::default());
    let token = CancellationToken::new();

    // Fill the queue before the dispatcher exists so the reorder decides
    // the full dispatch order.
    scheduler
        .submit_job("low", Duration::from_millis(5), 1)
        .await
        .unwrap();
    scheduler
        .submit_job("high", Duration::from_millis(5), 9)
        .await
        .unwrap();
    scheduler
        .submit_job("mid", Duration::from_millis(5), 5)
        .await
        .unwrap();
    assert!(scheduler.change_policy("priority"));
    assert_eq!(scheduler.active_policy(), SchedulingPolicy::Priority);

    let dispatcher = Dispatcher::new(queue.clone(), SimulatedExecutor, sink.clone(), token.clone());
    let handle = tokio::spawn(dispatcher.run());

    wait_for("all three jobs to finish", || sink.reports().len() == 3).await;
    let names: Vec<String> = sink.reports().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["high", "mid", "low"]);

    token.cancel();
    handle.await.unwrap();
}
