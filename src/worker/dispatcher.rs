use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::scheduler::core::CompletionSink;
use crate::scheduler::job::JobRecord;
use crate::scheduler::queue::JobQueue;
use crate::worker::executor::JobExecutor;

/// Read-only view of the job currently executing, shared with the display
/// layer while the dispatcher task owns itself.
#[derive(Clone, Default)]
pub struct CurrentJob(Arc<Mutex<Option<JobRecord>>>);

impl CurrentJob {
    pub fn get(&self) -> Option<JobRecord> {
        self.0.lock().expect("current job lock poisoned").clone()
    }

    fn set(&self, job: &JobRecord) {
        *self.0.lock().expect("current job lock poisoned") = Some(job.clone());
    }

    fn clear(&self) {
        *self.0.lock().expect("current job lock poisoned") = None;
    }
}

/// Single consumer loop modeling a one-CPU server.
///
/// Pulls one job at a time, runs it through the executor, and reports the
/// outcome into the completion sink. Exactly one dispatcher runs per queue;
/// there is deliberately no pool and no preemption.
pub struct Dispatcher<E: JobExecutor> {
    queue: Arc<JobQueue>,
    executor: E,
    sink: Arc<dyn CompletionSink>,
    current: CurrentJob,
    shutdown: CancellationToken,
}

impl<E: JobExecutor> Dispatcher<E> {
    pub fn new(
        queue: Arc<JobQueue>,
        executor: E,
        sink: Arc<dyn CompletionSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            executor,
            sink,
            current: CurrentJob::default(),
            shutdown,
        }
    }

    /// Handle for observing the in-flight job.
    pub fn current_job(&self) -> CurrentJob {
        self.current.clone()
    }

    /// Run until the shutdown token fires or the queue closes.
    ///
    /// The stop signal is only polled between dispatch cycles: a job that is
    /// already executing always runs to completion first. An executor error
    /// fails the job, is logged, and the loop moves on.
    pub async fn run(self) {
        loop {
            let mut job = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                taken = self.queue.take() => match taken {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            job.mark_running();
            self.current.set(&job);
            tracing::info!(
                job = %job.name(),
                secs = job.exec_time().as_secs_f64(),
                "executing job"
            );

            match self.executor.execute(&job).await {
                Ok(()) => {
                    job.mark_completed();
                    if let Some(actual) = job.start_time().zip(job.end_time()) {
                        tracing::info!(
                            job = %job.name(),
                            secs = crate::scheduler::stats::delta_seconds(actual.1 - actual.0),
                            "job completed"
                        );
                    }
                }
                Err(err) => {
                    job.mark_failed();
                    tracing::error!(job = %job.name(), error = %err, "job execution failed");
                }
            }

            self.sink.register_completion(&job);
            self.current.clear();
        }

        tracing::info!("dispatcher stopped");
    }
}
