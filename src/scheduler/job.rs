use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state of a job.
///
/// Transitions are monotone: Waiting -> Running -> Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of batch work together with its lifecycle timestamps.
///
/// Timestamps are write-once: arrival is stamped by the queue on enqueue,
/// start on dispatch, end on completion or failure. Invalid transitions are
/// ignored rather than panicking, so a record can never move backwards.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    id: Uuid,
    name: String,
    exec_time: Duration,
    priority: i32,
    status: JobStatus,
    arrival_time: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(name: impl Into<String>, exec_time: Duration, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            exec_time,
            priority,
            status: JobStatus::Waiting,
            arrival_time: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exec_time(&self) -> Duration {
        self.exec_time
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.arrival_time
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Stamp the arrival time. Called once by the queue on enqueue.
    pub(crate) fn mark_arrived(&mut self) {
        if self.arrival_time.is_none() {
            self.arrival_time = Some(Utc::now());
        }
    }

    /// Waiting -> Running, stamping the start time.
    pub fn mark_running(&mut self) {
        if self.status == JobStatus::Waiting {
            self.status = JobStatus::Running;
            self.start_time = Some(Utc::now());
        }
    }

    /// Running -> Completed, stamping the end time.
    pub fn mark_completed(&mut self) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Completed;
            self.end_time = Some(Utc::now());
        }
    }

    /// Running -> Failed, stamping the end time. Failed jobs are excluded
    /// from response-time aggregates.
    pub fn mark_failed(&mut self) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Failed;
            self.end_time = Some(Utc::now());
        }
    }

    /// Turnaround: end minus arrival, once both are stamped.
    pub fn response_time(&self) -> Option<TimeDelta> {
        match (self.end_time, self.arrival_time) {
            (Some(end), Some(arrival)) => Some(end - arrival),
            _ => None,
        }
    }

    /// Start minus arrival, once both are stamped.
    pub fn waiting_time(&self) -> Option<TimeDelta> {
        match (self.start_time, self.arrival_time) {
            (Some(start), Some(arrival)) => Some(start - arrival),
            _ => None,
        }
    }
}
