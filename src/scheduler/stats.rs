use chrono::TimeDelta;
use serde::Serialize;

use crate::scheduler::policy::SchedulingPolicy;

/// Convert a chrono delta to fractional seconds.
pub(crate) fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        // Only reachable for deltas beyond ~292k years.
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Running totals for one policy bucket.
#[derive(Debug, Default, Clone, Copy)]
struct PolicyAccum {
    jobs: u64,
    total_response_time: f64,
}

impl PolicyAccum {
    fn average(&self) -> f64 {
        if self.jobs > 0 {
            self.total_response_time / self.jobs as f64
        } else {
            0.0
        }
    }
}

/// Scheduler-owned aggregate counters.
///
/// Mutated only while the scheduler holds its stats lock; completions are
/// bucketed by whichever policy is active when they are registered, not the
/// policy that was active at submission.
#[derive(Debug, Default)]
pub(crate) struct StatsAccum {
    pub(crate) total_jobs: u64,
    pub(crate) completed_jobs: u64,
    pub(crate) failed_jobs: u64,
    total_response_time: f64,
    fcfs: PolicyAccum,
    sjf: PolicyAccum,
    priority: PolicyAccum,
}

impl StatsAccum {
    pub(crate) fn record_completion(&mut self, response_seconds: f64, policy: SchedulingPolicy) {
        self.completed_jobs += 1;
        self.total_response_time += response_seconds;
        let bucket = match policy {
            SchedulingPolicy::Fcfs => &mut self.fcfs,
            SchedulingPolicy::Sjf => &mut self.sjf,
            SchedulingPolicy::Priority => &mut self.priority,
        };
        bucket.jobs += 1;
        bucket.total_response_time += response_seconds;
    }

    pub(crate) fn snapshot(&self, elapsed_seconds: f64) -> StatsSnapshot {
        let avg_response_time = if self.completed_jobs > 0 {
            self.total_response_time / self.completed_jobs as f64
        } else {
            0.0
        };
        let throughput = if elapsed_seconds > 0.0 {
            self.completed_jobs as f64 / elapsed_seconds
        } else {
            0.0
        };
        StatsSnapshot {
            total_jobs: self.total_jobs,
            completed_jobs: self.completed_jobs,
            failed_jobs: self.failed_jobs,
            avg_response_time,
            throughput,
            policies: PolicyBreakdown {
                fcfs: PolicyStats {
                    jobs: self.fcfs.jobs,
                    avg_response_time: self.fcfs.average(),
                },
                sjf: PolicyStats {
                    jobs: self.sjf.jobs,
                    avg_response_time: self.sjf.average(),
                },
                priority: PolicyStats {
                    jobs: self.priority.jobs,
                    avg_response_time: self.priority.average(),
                },
            },
        }
    }
}

/// Point-in-time performance report.
///
/// A flat serializable record so external tooling can export it in any
/// format; the core itself never picks one.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    /// Mean turnaround of completed jobs, in seconds. Zero when nothing has
    /// completed; failed jobs never contribute.
    pub avg_response_time: f64,
    /// Completed jobs per second of scheduler wall time.
    pub throughput: f64,
    pub policies: PolicyBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyBreakdown {
    pub fcfs: PolicyStats,
    pub sjf: PolicyStats,
    pub priority: PolicyStats,
}

impl PolicyBreakdown {
    pub fn get(&self, policy: SchedulingPolicy) -> &PolicyStats {
        match policy {
            SchedulingPolicy::Fcfs => &self.fcfs,
            SchedulingPolicy::Sjf => &self.sjf,
            SchedulingPolicy::Priority => &self.priority,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PolicyStats {
    pub jobs: u64,
    pub avg_response_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_reports_zeroes() {
        let accum = StatsAccum::default();
        let snap = accum.snapshot(10.0);
        assert_eq!(snap.completed_jobs, 0);
        assert_eq!(snap.avg_response_time, 0.0);
        assert_eq!(snap.throughput, 0.0);
    }

    #[test]
    fn completions_fold_into_active_policy_bucket() {
        let mut accum = StatsAccum::default();
        accum.record_completion(2.0, SchedulingPolicy::Sjf);
        accum.record_completion(4.0, SchedulingPolicy::Sjf);
        accum.record_completion(9.0, SchedulingPolicy::Priority);

        let snap = accum.snapshot(5.0);
        assert_eq!(snap.completed_jobs, 3);
        assert!((snap.avg_response_time - 5.0).abs() < 1e-9);
        assert!((snap.throughput - 0.6).abs() < 1e-9);
        assert_eq!(snap.policies.sjf.jobs, 2);
        assert!((snap.policies.sjf.avg_response_time - 3.0).abs() < 1e-9);
        assert_eq!(snap.policies.priority.jobs, 1);
        assert_eq!(snap.policies.fcfs.jobs, 0);
        assert_eq!(snap.policies.fcfs.avg_response_time, 0.0);
    }

    #[test]
    fn zero_elapsed_time_means_zero_throughput() {
        let mut accum = StatsAccum::default();
        accum.record_completion(1.0, SchedulingPolicy::Fcfs);
        assert_eq!(accum.snapshot(0.0).throughput, 0.0);
    }

    #[test]
    fn delta_seconds_converts_microseconds() {
        let delta = TimeDelta::microseconds(1_500_000);
        assert!((delta_seconds(delta) - 1.5).abs() < 1e-9);
    }
}
