//! # Configuration hot reload.
//!
//! Watches the single configuration file and injects *additions* into the
//! running pool: services whose label is not yet known are started through
//! the pool's reload channel, plugin keys not yet loaded are prepared and
//! registered. Nothing that already runs is touched: removed services keep
//! running and field changes to existing services are ignored.
//!
//! Every change event re-parses the file. A parse failure (including the
//! half-written states some editors produce) is logged and skipped, leaving
//! live state unchanged; a parse whose `assist.configReload` flag is off
//! stops the watcher and tells the pool's listener to exit.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{self, LiveConfig, fill_defaults};
use crate::error::ReloadError;
use crate::plugins::{Assist, Plugin};
use crate::pool::{Executable, Handler, Pool};

/// Capacity of the watcher→controller event channel; change bursts coalesce.
const EVENT_CHANNEL_CAPACITY: usize = 4;

/// Starts watching `path` and spawns the reload controller task.
///
/// The watcher observes the parent directory so editors that replace the
/// file (rename-then-write) keep triggering events.
pub(crate) fn spawn(
    path: PathBuf,
    live: Arc<Mutex<LiveConfig>>,
    pool: Arc<Pool>,
    ctx: CancellationToken,
) -> Result<JoinHandle<()>, ReloadError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name: Option<OsString> = path.file_name().map(OsString::from);

    let (tx, rx) = mpsc::channel::<()>(EVENT_CHANNEL_CAPACITY);
    let mut watcher = notify::recommended_watcher(move |event: Result<Event, notify::Error>| {
        match event {
            Ok(event) if is_relevant(&event, file_name.as_deref()) => {
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(err) => warn!("config watch error: {err}"),
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    info!(config = %path.display(), "watching configuration for changes");
    Ok(tokio::spawn(watch_loop(path, live, pool, ctx, rx, watcher)))
}

fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    let path_matches = match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(name)),
        None => true,
    };
    kind_matches && path_matches
}

async fn watch_loop(
    path: PathBuf,
    live: Arc<Mutex<LiveConfig>>,
    pool: Arc<Pool>,
    ctx: CancellationToken,
    mut rx: mpsc::Receiver<()>,
    _watcher: notify::RecommendedWatcher,
) {
    let pool_done = pool.done();
    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            _ = pool_done.cancelled() => break,
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
                if !apply_change(&path, &live, &pool, &ctx).await {
                    break;
                }
            }
        }
    }
}

/// Applies one change event. Returns `false` when watching should stop.
async fn apply_change(
    path: &Path,
    live: &Arc<Mutex<LiveConfig>>,
    pool: &Arc<Pool>,
    ctx: &CancellationToken,
) -> bool {
    info!(config = %path.display(), "configuration change detected");
    let parsed = match config::parse_file(path) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("ignoring configuration change: {err}");
            return true;
        }
    };

    if !reload_enabled(&parsed) {
        info!("configuration reload switched off, stopping watcher");
        pool.close_reload();
        return false;
    }

    let config::Config {
        services, loaded, ..
    } = parsed;
    let mut live = live.lock().await;

    let fresh = new_services(&live.services, services);
    if fresh.is_empty() {
        info!("no new services to start");
    }
    for mut service in fresh {
        fill_defaults(&mut service);
        info!(service = %service.name, "hot-adding service");
        live.services.push(service.clone());

        let service = Arc::new(service);
        pool.add(Arc::clone(&service)).await;
        if pool.reload_handle().submit(service).await.is_err() {
            warn!("pool reload listener is gone, stopping watcher");
            return false;
        }
    }

    for (name, mut plugin) in loaded {
        if live.plugins.contains_key(&name) {
            continue;
        }
        match plugin.prepare(ctx, pool).await {
            Ok(()) => {
                info!(plugin = %name, "hot-loaded plugin ready");
                let plugin: Arc<dyn Plugin> = Arc::from(plugin);
                let handler: Arc<dyn Handler> = Arc::clone(&plugin) as Arc<dyn Handler>;
                pool.watch(handler).await;
                live.plugins.insert(name, plugin);
            }
            Err(err) => {
                warn!(plugin = %name, "failed to prepare hot-loaded plugin: {err}");
                live.plugins.insert(name, Arc::from(plugin));
            }
        }
    }

    true
}

fn reload_enabled(config: &config::Config) -> bool {
    config
        .loaded
        .get("assist")
        .and_then(|plugin| plugin.as_any().downcast_ref::<Assist>())
        .is_some_and(|assist| assist.config_reload)
}

/// Entries of `parsed` whose label does not appear in `live`.
fn new_services(live: &[Executable], parsed: Vec<Executable>) -> Vec<Executable> {
    let known: HashSet<&str> = live.iter().map(|service| service.name.as_str()).collect();
    parsed
        .into_iter()
        .filter(|service| !known.contains(service.name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::new_services;
    use crate::pool::Executable;

    #[test]
    fn diff_picks_only_unknown_labels() {
        let live = vec![
            Executable::new("/bin/a").with_name("a"),
            Executable::new("/bin/b").with_name("b"),
        ];
        let parsed = vec![
            Executable::new("/bin/a").with_name("a"),
            Executable::new("/bin/c").with_name("c"),
        ];

        let fresh = new_services(&live, parsed);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].name, "c");
    }

    #[test]
    fn identical_configs_diff_to_nothing() {
        let live = vec![Executable::new("/bin/a").with_name("a")];
        let parsed = vec![Executable::new("/bin/a").with_name("a")];
        assert!(new_services(&live, parsed).is_empty());
    }
}
