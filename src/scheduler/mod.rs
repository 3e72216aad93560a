pub mod core;
pub mod job;
pub mod policy;
pub mod queue;
pub mod stats;

pub use self::core::{CompletionSink, Scheduler};
pub use job::{JobRecord, JobStatus};
pub use policy::SchedulingPolicy;
pub use queue::JobQueue;
pub use stats::{PolicyStats, StatsSnapshot};
