//! Job execution engine.
//!
//! - [`executor`]: backends that perform one job's simulated CPU work —
//!   in-process sleep or an external benchmark process.
//! - [`dispatcher`]: the single consumer loop that pulls jobs off the queue,
//!   runs them, and reports completions.

pub mod dispatcher;
pub mod executor;

pub use dispatcher::{CurrentJob, Dispatcher};
pub use executor::{CommandExecutor, ExecutionError, JobExecutor, SimulatedExecutor};
