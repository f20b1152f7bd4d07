//! # Pool: registry and event bus for supervised instances.
//!
//! The [`Pool`] owns three registries (supervisors, instances, handlers)
//! and mediates all concurrent access to them:
//!
//! - registry reads return snapshots, never the live list;
//! - no lock is held while user code (handler callbacks, instance stops) runs;
//! - lifecycle events fan out to handlers synchronously, in registration
//!   order, with panic isolation per handler.
//!
//! [`Pool::start_all`] is the blocking entry point: it starts every
//! registered supervisor on a shared task tracker, runs the hot-reload
//! listener when enabled, and returns once every instance (including
//! hot-added ones) has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::error::{RunError, SubmitError};
use crate::pool::{Executable, Handler, Runnable};

/// Capacity of the hot-reload hand-off channel; effectively a rendezvous
/// between the reload controller and the pool's listener.
const RELOAD_CHANNEL_CAPACITY: usize = 1;

/// Handle for submitting hot-added supervisors to a running pool.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<Arc<Executable>>,
}

impl ReloadHandle {
    /// Hands a new supervisor to the pool's reload listener, waiting until
    /// the listener accepts it.
    pub async fn submit(&self, supervisor: Arc<Executable>) -> Result<(), SubmitError> {
        self.tx
            .send(supervisor)
            .await
            .map_err(|_| SubmitError::Closed)
    }
}

/// Registry and event bus coordinating supervisors, instances, and handlers.
pub struct Pool {
    /// Non-owning handle to ourselves, passed down to instances.
    self_ref: Weak<Pool>,

    supervisors: RwLock<Vec<Arc<Executable>>>,
    instances: RwLock<Vec<Arc<Runnable>>>,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,

    terminating: AtomicBool,
    hot_reload: AtomicBool,
    done: CancellationToken,
    reload_close: CancellationToken,
    tracker: TaskTracker,

    reload_tx: mpsc::Sender<Arc<Executable>>,
    reload_rx: Mutex<Option<mpsc::Receiver<Arc<Executable>>>>,
}

impl Pool {
    /// Creates an empty pool.
    pub fn new() -> Arc<Self> {
        let (reload_tx, reload_rx) = mpsc::channel(RELOAD_CHANNEL_CAPACITY);
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            supervisors: RwLock::new(Vec::new()),
            instances: RwLock::new(Vec::new()),
            handlers: RwLock::new(Vec::new()),
            terminating: AtomicBool::new(false),
            hot_reload: AtomicBool::new(false),
            done: CancellationToken::new(),
            reload_close: CancellationToken::new(),
            tracker: TaskTracker::new(),
            reload_tx,
            reload_rx: Mutex::new(Some(reload_rx)),
        })
    }

    /// Registers a supervisor definition. No-op while terminating.
    pub async fn add(&self, supervisor: Arc<Executable>) {
        if self.is_terminating() {
            return;
        }
        self.supervisors.write().await.push(supervisor);
    }

    /// Registers a lifecycle handler.
    ///
    /// A handler added mid-run observes only subsequent transitions.
    pub async fn watch(&self, handler: Arc<dyn Handler>) {
        self.handlers.write().await.push(handler);
    }

    /// Starts one supervisor and records the instance.
    ///
    /// Returns `None` while terminating.
    pub async fn start(
        &self,
        ctx: &CancellationToken,
        supervisor: Arc<Executable>,
    ) -> Option<Arc<Runnable>> {
        if self.is_terminating() {
            return None;
        }
        let me = self.self_ref.upgrade()?;
        let instance = supervisor.start(ctx, &me);
        self.instances.write().await.push(Arc::clone(&instance));
        Some(instance)
    }

    /// Starts every registered supervisor and blocks until all instances,
    /// including any injected through the reload channel, have finished
    /// and the reload listener has exited.
    pub async fn start_all(&self, ctx: &CancellationToken) {
        if self.is_terminating() {
            return;
        }
        for supervisor in self.supervisors().await {
            let _ = self.start(ctx, supervisor).await;
        }

        let listener = match self.self_ref.upgrade() {
            Some(me) if self.hot_reload.load(Ordering::SeqCst) => self
                .reload_rx
                .lock()
                .await
                .take()
                .map(|rx| tokio::spawn(me.reload_listener(ctx.clone(), rx))),
            _ => None,
        };

        self.tracker.close();
        self.tracker.wait().await;

        if let Some(listener) = listener {
            self.reload_close.cancel();
            let _ = listener.await;
        }
    }

    /// Receives hot-added supervisors and starts them on the shared tracker,
    /// so the surrounding [`start_all`](Self::start_all) waits for them too.
    async fn reload_listener(
        self: Arc<Self>,
        ctx: CancellationToken,
        mut rx: mpsc::Receiver<Arc<Executable>>,
    ) {
        loop {
            tokio::select! {
                _ = self.reload_close.cancelled() => break,
                _ = self.done.cancelled() => break,
                received = rx.recv() => match received {
                    Some(supervisor) => {
                        let _ = self.start(&ctx, supervisor).await;
                    }
                    None => break,
                },
            }
        }
    }

    /// Stops one instance and removes it from the registry.
    pub async fn stop(&self, instance: &Arc<Runnable>) {
        instance.stop().await;
        self.remove_instance(instance).await;
    }

    /// Atomically grabs the instance registry and stops every instance
    /// concurrently, returning once all have completed.
    pub async fn stop_all(&self) {
        let grabbed: Vec<Arc<Runnable>> = {
            let mut instances = self.instances.write().await;
            std::mem::take(&mut *instances)
        };

        let mut stops = JoinSet::new();
        for instance in grabbed {
            stops.spawn(async move { instance.stop().await });
        }
        while stops.join_next().await.is_some() {}
    }

    /// Idempotent shutdown: rejects new work, stops every instance, and
    /// closes the done signal.
    pub async fn terminate(&self) {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_all().await;
        self.done.cancel();
    }

    /// Snapshot of the supervisor registry.
    pub async fn supervisors(&self) -> Vec<Arc<Executable>> {
        self.supervisors.read().await.clone()
    }

    /// Snapshot of the live instance registry.
    pub async fn instances(&self) -> Vec<Arc<Runnable>> {
        self.instances.read().await.clone()
    }

    /// Token cancelled by [`terminate`](Self::terminate).
    pub fn done(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Whether the pool rejects new work.
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Handle for submitting hot-added supervisors.
    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.reload_tx.clone(),
        }
    }

    /// Arms the reload listener for the next [`start_all`](Self::start_all).
    pub fn enable_hot_reload(&self) {
        self.hot_reload.store(true, Ordering::SeqCst);
    }

    /// Tells the reload listener to exit; used when reload is switched off.
    pub fn close_reload(&self) {
        self.reload_close.cancel();
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub(crate) async fn remove_instance(&self, instance: &Runnable) {
        let mut instances = self.instances.write().await;
        instances.retain(|other| !std::ptr::eq(Arc::as_ptr(other), instance));
    }

    async fn handlers_snapshot(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.read().await.clone()
    }

    pub(crate) async fn on_spawned(&self, instance: &Arc<Runnable>) {
        for handler in self.handlers_snapshot().await {
            let fut = handler.on_spawned(instance);
            if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                warn!(
                    handler = handler.name(),
                    "handler panicked in on_spawned: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    pub(crate) async fn on_started(&self, instance: &Arc<Runnable>) {
        for handler in self.handlers_snapshot().await {
            let fut = handler.on_started(instance);
            if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                warn!(
                    handler = handler.name(),
                    "handler panicked in on_started: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    pub(crate) async fn on_stopped(&self, instance: &Arc<Runnable>, error: Option<&RunError>) {
        for handler in self.handlers_snapshot().await {
            let fut = handler.on_stopped(instance, error);
            if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                warn!(
                    handler = handler.name(),
                    "handler panicked in on_stopped: {}",
                    panic_message(&panic)
                );
            }
        }
    }

    pub(crate) async fn on_finished(&self, instance: &Arc<Runnable>) {
        for handler in self.handlers_snapshot().await {
            let fut = handler.on_finished(instance);
            if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                warn!(
                    handler = handler.name(),
                    "handler panicked in on_finished: {}",
                    panic_message(&panic)
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
