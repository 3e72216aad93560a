use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{BatchError, Result};
use crate::scheduler::job::{JobRecord, JobStatus};
use crate::scheduler::policy::SchedulingPolicy;
use crate::scheduler::queue::JobQueue;
use crate::scheduler::stats::{delta_seconds, StatsAccum, StatsSnapshot};

/// Where the dispatcher reports finished jobs.
///
/// Keeps the dispatcher's dependency on the scheduler one-directional: the
/// dispatcher only ever sees this seam, never the scheduler itself.
pub trait CompletionSink: Send + Sync + 'static {
    fn register_completion(&self, job: &JobRecord);
}

/// Owns policy selection, job submission, and aggregate statistics.
pub struct Scheduler {
    queue: Arc<JobQueue>,
    stats: Mutex<StatsAccum>,
    started_at: Instant,
}

impl Scheduler {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self {
            queue,
            stats: Mutex::new(StatsAccum::default()),
            started_at: Instant::now(),
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    fn stats_lock(&self) -> std::sync::MutexGuard<'_, StatsAccum> {
        self.stats.lock().expect("scheduler stats lock poisoned")
    }

    /// Validate parameters, build a waiting record, and enqueue it.
    ///
    /// Suspends while the queue is at capacity. The returned record carries
    /// its arrival timestamp, stamped by the queue.
    pub async fn submit_job(
        &self,
        name: &str,
        exec_time: Duration,
        priority: i32,
    ) -> Result<JobRecord> {
        if name.is_empty() {
            return Err(BatchError::InvalidJob("job name must not be empty".into()));
        }
        if exec_time.is_zero() {
            return Err(BatchError::InvalidJob(
                "execution time must be positive".into(),
            ));
        }
        if priority < 0 {
            return Err(BatchError::InvalidJob(format!(
                "priority must be non-negative, got {priority}"
            )));
        }

        let job = JobRecord::new(name, exec_time, priority);
        let stamped = self.queue.add(job).await?;
        self.stats_lock().total_jobs += 1;
        tracing::info!(
            job = %stamped.name(),
            secs = exec_time.as_secs_f64(),
            priority,
            "job submitted"
        );
        Ok(stamped)
    }

    /// Switch the active policy by name. Unrecognized names change nothing
    /// and return false.
    pub fn change_policy(&self, name: &str) -> bool {
        match name.parse::<SchedulingPolicy>() {
            Ok(policy) => {
                self.set_policy(policy);
                true
            }
            Err(_) => {
                tracing::warn!(policy = name, "rejected unknown scheduling policy");
                false
            }
        }
    }

    /// Switch the active policy, atomically re-sorting the waiting queue.
    pub fn set_policy(&self, policy: SchedulingPolicy) {
        self.queue.reorder(policy);
    }

    pub fn active_policy(&self) -> SchedulingPolicy {
        self.queue.active_policy()
    }

    /// Fold one finished job into the aggregates.
    ///
    /// Completed jobs contribute their response time to the global mean and
    /// to the bucket of the policy active right now; failed jobs only bump
    /// the failure counter.
    pub fn register_completion(&self, job: &JobRecord) {
        match job.status() {
            JobStatus::Completed => {
                let Some(response) = job.response_time() else {
                    tracing::warn!(job = %job.name(), "completed job missing timestamps");
                    return;
                };
                let policy = self.queue.active_policy();
                self.stats_lock()
                    .record_completion(delta_seconds(response), policy);
            }
            JobStatus::Failed => {
                self.stats_lock().failed_jobs += 1;
            }
            status @ (JobStatus::Waiting | JobStatus::Running) => {
                tracing::warn!(
                    job = %job.name(),
                    status = %status,
                    "ignoring completion report for unfinished job"
                );
            }
        }
    }

    /// Derive the current performance report.
    pub fn performance_stats(&self) -> StatsSnapshot {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        self.stats_lock().snapshot(elapsed)
    }
}

impl CompletionSink for Scheduler {
    fn register_completion(&self, job: &JobRecord) {
        Scheduler::register_completion(self, job)
    }
}
