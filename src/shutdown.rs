use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::scheduler::JobQueue;

/// Watch for SIGTERM and SIGINT and start a graceful drain on the first one.
///
/// On signal the queue is closed, so new submissions fail and a dispatcher
/// blocked on `take` wakes up, and the returned token is cancelled. A job
/// already executing runs to completion.
pub fn install_shutdown_handler(queue: Arc<JobQueue>) -> CancellationToken {
    let token = CancellationToken::new();
    let drain = token.clone();

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = received, "shutting down, draining the queue");

        queue.close();
        drain.cancel();
    });

    token
}
