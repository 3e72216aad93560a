use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::scheduler::job::JobRecord;

/// Scheduling policy applied to the waiting queue.
///
/// The comparator only ever orders jobs that are waiting; jobs already
/// dispatched are never re-sorted or re-stamped by a policy change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// First-Come-First-Served: ascending arrival time.
    Fcfs,
    /// Shortest-Job-First: ascending execution time.
    Sjf,
    /// Descending priority value (higher number = more urgent).
    Priority,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 3] = [
        SchedulingPolicy::Fcfs,
        SchedulingPolicy::Sjf,
        SchedulingPolicy::Priority,
    ];

    fn primary(&self, a: &JobRecord, b: &JobRecord) -> Ordering {
        match self {
            SchedulingPolicy::Fcfs => a.arrival_time().cmp(&b.arrival_time()),
            SchedulingPolicy::Sjf => a.exec_time().cmp(&b.exec_time()),
            SchedulingPolicy::Priority => b.priority().cmp(&a.priority()),
        }
    }

    /// Full queue ordering: policy key first, arrival order on ties.
    pub fn compare(&self, a: &JobRecord, b: &JobRecord) -> Ordering {
        self.primary(a, b)
            .then_with(|| a.arrival_time().cmp(&b.arrival_time()))
    }
}

impl std::fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingPolicy::Fcfs => write!(f, "FCFS"),
            SchedulingPolicy::Sjf => write!(f, "SJF"),
            SchedulingPolicy::Priority => write!(f, "Priority"),
        }
    }
}

impl FromStr for SchedulingPolicy {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulingPolicy::Fcfs),
            "sjf" => Ok(SchedulingPolicy::Sjf),
            "priority" => Ok(SchedulingPolicy::Priority),
            _ => Err(BatchError::UnknownPolicy(s.to_string())),
        }
    }
}
