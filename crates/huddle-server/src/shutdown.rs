//! Server-wide stop signal.
//!
//! Sessions and the HTTP listener each hold a clone of the token. Firing it
//! makes every session run its normal teardown and stops the listener from
//! accepting.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the stop signal.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone of the stop token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the stop signal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Fire the signal and wait up to `grace` for `tasks`.
    ///
    /// Returns `false` when some task was still running at the deadline; those
    /// tasks are aborted.
    pub async fn graceful_shutdown(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) -> bool {
        self.shutdown();
        info!(tasks = tasks.len(), ?grace, "draining server tasks");

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(grace, futures::future::join_all(tasks))
            .await
            .is_ok()
        {
            return true;
        }
        warn!(?grace, "tasks still running after grace period, aborting");
        for abort in aborts {
            abort.abort();
        }
        false
    }
}
