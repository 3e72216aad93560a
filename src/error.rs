use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    #[error("Invalid job submission: {0}")]
    InvalidJob(String),

    #[error("Job queue is closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, BatchError>;
