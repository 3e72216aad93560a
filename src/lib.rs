pub mod config;
pub mod error;
pub mod scheduler;
pub mod shutdown;
pub mod worker;
