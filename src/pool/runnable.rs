//! # Runnable: the per-instance restart loop.
//!
//! A [`Runnable`] wraps one [`Executable`] and drives it through repeated
//! executions according to the restart budget, reporting every transition
//! to the owning [`Pool`](crate::pool::Pool).
//!
//! ## Event flow
//! ```text
//! on_spawned
//! loop {
//!   on_started → [child runs] → on_stopped(result)
//!   budget? (-1 = infinite, <= 0 after a run = exit)
//!   sleep(restart_delay)  — cancellation exits immediately
//! }
//! on_finished → instance removed from pool → completion latch closes
//! ```
//!
//! ## Rules
//! - Runs are strictly sequential within one instance.
//! - `stop()` cancels the instance token and waits for the latch.
//! - Cancellation during the restart delay exits without another run.

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pool::{Executable, Pool};

/// A running child-process manager: one instance of an [`Executable`].
pub struct Runnable {
    spec: Arc<Executable>,
    running: AtomicBool,
    cancel: CancellationToken,
    done: CancellationToken,
    pool: Weak<Pool>,
}

impl Runnable {
    pub(crate) fn new(
        spec: Arc<Executable>,
        cancel: CancellationToken,
        pool: Weak<Pool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            spec,
            running: AtomicBool::new(false),
            cancel,
            done: CancellationToken::new(),
            pool,
        })
    }

    /// The definition this instance runs.
    pub fn spec(&self) -> &Arc<Executable> {
        &self.spec
    }

    /// Whether a child process is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancels the instance and waits until its restart loop has exited.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.done.cancelled().await;
    }

    /// Completes when the restart loop has exited.
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }

    /// Drives the restart loop until the budget is exhausted or the
    /// instance is cancelled.
    pub(crate) async fn run_loop(self: Arc<Self>) {
        let Some(pool) = self.pool.upgrade() else {
            self.done.cancel();
            return;
        };

        let mut restarts = self.spec.restart;
        pool.on_spawned(&self).await;

        loop {
            self.running.store(true, Ordering::SeqCst);
            pool.on_started(&self).await;

            let result = self.spec.run(&self.cancel).await;
            match &result {
                Ok(()) => info!(service = %self.spec.name, "stopped"),
                Err(err) => warn!(service = %self.spec.name, "stopped with error: {err}"),
            }

            self.running.store(false, Ordering::SeqCst);
            pool.on_stopped(&self, result.as_ref().err()).await;

            if restarts != -1 {
                if restarts <= 0 {
                    info!(service = %self.spec.name, "restart budget exhausted");
                    break;
                }
                restarts -= 1;
            }

            debug!(
                service = %self.spec.name,
                delay = ?self.spec.restart_timeout,
                "waiting before restart"
            );
            tokio::select! {
                _ = time::sleep(self.spec.restart_timeout) => {}
                _ = self.cancel.cancelled() => {
                    debug!(service = %self.spec.name, "instance cancelled");
                    break;
                }
            }
        }

        info!(service = %self.spec.name, "restart loop done");
        pool.on_finished(&self).await;
        pool.remove_instance(&self).await;
        self.done.cancel();
    }
}
