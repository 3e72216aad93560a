use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

use crate::scheduler::job::JobRecord;

/// Failure reported by an execution backend.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to spawn benchmark process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Benchmark process exited with code {0:?}")]
    NonZeroExit(Option<i32>),
}

/// Executes one job's simulated CPU work.
///
/// The dispatcher treats this as an opaque blocking call: no timeout is
/// applied, so a backend that never returns stalls dispatch indefinitely.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        job: &JobRecord,
    ) -> impl Future<Output = Result<(), ExecutionError>> + Send;
}

/// In-process simulation: occupies the single CPU slot for the job's
/// execution time without spawning anything.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor;

impl JobExecutor for SimulatedExecutor {
    async fn execute(&self, job: &JobRecord) -> Result<(), ExecutionError> {
        tokio::time::sleep(job.exec_time()).await;
        Ok(())
    }
}

/// Runs an external benchmark program with the job's duration (in seconds)
/// as its only argument, capturing output.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl JobExecutor for CommandExecutor {
    async fn execute(&self, job: &JobRecord) -> Result<(), ExecutionError> {
        let output = Command::new(&self.program)
            .arg(format!("{}", job.exec_time().as_secs_f64()))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                tracing::error!(
                    job = %job.name(),
                    program = %self.program.display(),
                    stderr = %stderr.trim_end(),
                    "benchmark process failed"
                );
            }
            Err(ExecutionError::NonZeroExit(output.status.code()))
        }
    }
}
