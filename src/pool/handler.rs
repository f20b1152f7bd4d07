//! # Lifecycle observer trait.
//!
//! `Handler` is the extension point for reacting to instance lifecycle
//! transitions. Handlers are registered on a [`Pool`](crate::pool::Pool) via
//! [`Pool::watch`](crate::pool::Pool::watch) and are invoked synchronously,
//! in registration order, on the task that produced the transition.
//!
//! ## Contract
//! - Per instance, `on_spawned` precedes every other callback and
//!   `on_finished` follows every other callback; each `on_started` is
//!   matched by exactly one `on_stopped` before the next `on_started`.
//! - Across instances there is no ordering.
//! - A panicking handler does not prevent the remaining handlers from
//!   running; the panic is caught and logged.
//! - A handler registered mid-run observes only subsequent transitions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RunError;
use crate::pool::Runnable;

/// Contract for lifecycle observers.
///
/// Callbacks run on the instance's own task; slow handlers delay the
/// restart loop of the instance that produced the event, so long work
/// should be queued elsewhere.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The instance's restart loop has been spawned.
    async fn on_spawned(&self, instance: &Arc<Runnable>);

    /// A child process execution is starting.
    async fn on_started(&self, instance: &Arc<Runnable>);

    /// A child process execution finished; `error` is `None` on a clean exit.
    async fn on_stopped(&self, instance: &Arc<Runnable>, error: Option<&RunError>);

    /// The instance's restart loop has exited; no further callbacks follow.
    async fn on_finished(&self, instance: &Arc<Runnable>);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
