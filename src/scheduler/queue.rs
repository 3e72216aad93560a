use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Semaphore;

use crate::error::{BatchError, Result};
use crate::scheduler::job::JobRecord;
use crate::scheduler::policy::SchedulingPolicy;

struct Inner {
    jobs: VecDeque<JobRecord>,
    policy: SchedulingPolicy,
}

/// Thread-safe buffer of waiting jobs, kept sorted under the active policy.
///
/// The classic bounded-buffer contract is expressed with semaphore permits:
/// `take` waits on an item permit, `add` waits on a capacity slot when the
/// queue is bounded. The storage and the active-policy flag live under one
/// mutex that is held only for short, non-awaiting critical sections, so a
/// reorder is linearizable with any concurrent `add` or `take`.
pub struct JobQueue {
    inner: Mutex<Inner>,
    items: Semaphore,
    slots: Option<Semaphore>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    /// An unbounded queue with the default FCFS policy.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A bounded queue: producers suspend while `capacity` jobs are waiting.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero: a zero-slot queue could never accept a
    /// job and every `add` would suspend forever.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self::build(Some(capacity))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: VecDeque::new(),
                policy: SchedulingPolicy::Fcfs,
            }),
            items: Semaphore::new(0),
            slots: capacity.map(Semaphore::new),
        }
    }

    /// Set the initial policy without reordering (the queue is empty at
    /// construction time).
    pub fn with_policy(self, policy: SchedulingPolicy) -> Self {
        self.lock().policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("job queue lock poisoned")
    }

    /// Enqueue a job, suspending while the queue is at capacity.
    ///
    /// Stamps the job's arrival time, inserts it at its position under the
    /// active policy, and wakes one waiting consumer. Returns the stamped
    /// record. Fails only when the queue has been closed.
    pub async fn add(&self, mut job: JobRecord) -> Result<JobRecord> {
        if self.items.is_closed() {
            return Err(BatchError::QueueClosed);
        }
        if let Some(slots) = &self.slots {
            let permit = slots.acquire().await.map_err(|_| BatchError::QueueClosed)?;
            permit.forget();
        }

        let stamped = {
            let mut inner = self.lock();
            // Re-check under the mutex: close() holds it too, so an add
            // racing a close either lands before the closure or fails here.
            if self.items.is_closed() {
                return Err(BatchError::QueueClosed);
            }
            job.mark_arrived();
            let at = inner
                .jobs
                .iter()
                .position(|queued| inner.policy.compare(queued, &job).is_gt())
                .unwrap_or(inner.jobs.len());
            let stamped = job.clone();
            inner.jobs.insert(at, job);
            stamped
        };

        tracing::debug!(job = %stamped.name(), queued = true, "job enqueued");
        self.items.add_permits(1);
        Ok(stamped)
    }

    /// Dequeue the head job under the active policy, suspending while the
    /// queue is empty. Frees one capacity slot for waiting producers.
    pub async fn take(&self) -> Result<JobRecord> {
        let permit = self
            .items
            .acquire()
            .await
            .map_err(|_| BatchError::QueueClosed)?;
        permit.forget();

        let job = {
            let mut inner = self.lock();
            inner
                .jobs
                .pop_front()
                .expect("item permit issued for an empty queue")
        };

        if let Some(slots) = &self.slots {
            slots.add_permits(1);
        }
        tracing::debug!(job = %job.name(), "job dequeued");
        Ok(job)
    }

    /// Re-sort every waiting job under `policy` and record it as active.
    ///
    /// Ties keep their relative arrival order. Jobs already dispatched are
    /// unaffected; only the waiting set is ever touched.
    pub fn reorder(&self, policy: SchedulingPolicy) {
        let mut inner = self.lock();
        inner.policy = policy;
        let mut jobs: Vec<JobRecord> = inner.jobs.drain(..).collect();
        jobs.sort_by(|a, b| policy.compare(a, b));
        inner.jobs.extend(jobs);
        tracing::info!(policy = %policy, waiting = inner.jobs.len(), "queue reordered");
    }

    /// Ordered clones of the waiting jobs, for display.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.lock().jobs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    pub fn active_policy(&self) -> SchedulingPolicy {
        self.lock().policy
    }

    /// Close the queue: every blocked or future `add`/`take` returns
    /// [`BatchError::QueueClosed`]. Jobs still waiting are left in place.
    ///
    /// Taken under the storage mutex, so closure linearizes with any `add`
    /// in flight: a job is either enqueued before the close or rejected.
    pub fn close(&self) {
        let _inner = self.lock();
        self.items.close();
        if let Some(slots) = &self.slots {
            slots.close();
        }
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("JobQueue")
            .field("waiting", &inner.jobs.len())
            .field("policy", &inner.policy)
            .finish()
    }
}
