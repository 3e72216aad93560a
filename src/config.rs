use std::path::PathBuf;

use crate::scheduler::policy::SchedulingPolicy;

/// How the dispatcher performs a job's simulated CPU work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutorConfig {
    /// In-process sleep for the job's duration.
    #[default]
    Simulated,
    /// Spawn this benchmark program with the duration as its argument.
    Benchmark { program: PathBuf },
}

/// Configuration for one scheduler instance.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of waiting jobs; `None` means unbounded. When bounded
    /// and full, submitters block until the dispatcher frees a slot.
    pub queue_capacity: Option<usize>,
    /// Policy active at startup.
    pub default_policy: SchedulingPolicy,
    pub executor: ExecutorConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            default_policy: SchedulingPolicy::Fcfs,
            executor: ExecutorConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_benchmark(mut self, program: impl Into<PathBuf>) -> Self {
        self.executor = ExecutorConfig::Benchmark {
            program: program.into(),
        };
        self
    }
}
