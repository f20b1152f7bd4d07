//! # Configuration model, loading, and wiring.
//!
//! A configuration file has one reserved top-level key, `services`; every
//! other top-level key names an observer plugin and is decoded by that
//! plugin. Multiple sources (files, or directories contributing their
//! top-level `*.yml`/`*.yaml` entries) merge into a single [`Config`]:
//! service lists concatenate, same-name plugins merge via their own rule,
//! and conflicting plugin scalars are a fatal error.
//!
//! [`Config::run`] wires a loaded configuration into a pool: plugins are
//! prepared and registered as handlers, services get their defaults and are
//! started, and when a single file source with reload enabled was given the
//! reload controller is spawned alongside.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::names;
use crate::plugins::{self, Assist, Plugin};
use crate::pool::{Executable, Handler, Pool};
use crate::reload;

/// A merged configuration: services plus per-plugin sections.
#[derive(Default, Serialize, Deserialize)]
pub struct Config {
    /// Supervised service definitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Executable>,

    /// Raw per-plugin configuration, keyed by plugin name.
    #[serde(flatten)]
    pub plugins: BTreeMap<String, serde_yaml::Value>,

    /// Decoded plugin instances; populated by the loader.
    #[serde(skip)]
    pub(crate) loaded: HashMap<String, Box<dyn Plugin>>,
}

impl Config {
    /// Builds a configuration holding only the given services.
    pub fn with_services(services: Vec<Executable>) -> Self {
        Self {
            services,
            ..Self::default()
        }
    }

    /// Builds every registered plugin named in [`Self::plugins`].
    ///
    /// Unknown keys and plugins whose configuration does not decode are
    /// logged and skipped.
    pub(crate) fn load_plugins(&mut self) {
        for (name, raw) in &self.plugins {
            match plugins::build(name, raw.clone()) {
                Some(Ok(plugin)) => {
                    self.loaded.insert(name.clone(), plugin);
                }
                Some(Err(err)) => warn!(plugin = %name, "failed to load plugin: {err}"),
                None => warn!(plugin = %name, "unknown plugin, skipping"),
            }
        }
    }

    /// Merges `other` into `self`.
    ///
    /// Service lists concatenate. Plugins present on both sides merge via
    /// the plugin's own rule; an irreconcilable pair aborts the load.
    pub fn merge_from(&mut self, other: Config) -> Result<(), ConfigError> {
        self.services.extend(other.services);
        for (name, raw) in other.plugins {
            self.plugins.entry(name).or_insert(raw);
        }
        for (name, plugin) in other.loaded {
            match self.loaded.get_mut(&name) {
                Some(own) => {
                    own.merge_from(plugin.as_ref())
                        .map_err(|source| ConfigError::PluginMerge {
                            plugin: name.clone(),
                            source,
                        })?;
                }
                None => {
                    self.loaded.insert(name, plugin);
                }
            }
        }
        Ok(())
    }

    /// Runs the configuration in `pool` until every service has finished or
    /// `ctx` is cancelled, then terminates the pool and closes plugins.
    ///
    /// `reload_source` carries the single configuration file to watch;
    /// watching actually starts only if the `assist` plugin enables it.
    pub async fn run(
        mut self,
        pool: &Arc<Pool>,
        ctx: &CancellationToken,
        reload_source: Option<PathBuf>,
    ) {
        let mut live = LiveConfig::default();

        for (name, mut plugin) in std::mem::take(&mut self.loaded) {
            match plugin.prepare(ctx, pool).await {
                Ok(()) => {
                    info!(plugin = %name, "plugin ready");
                    let plugin: Arc<dyn Plugin> = Arc::from(plugin);
                    let handler: Arc<dyn Handler> = Arc::clone(&plugin) as Arc<dyn Handler>;
                    pool.watch(handler).await;
                    live.plugins.insert(name, plugin);
                }
                Err(err) => {
                    warn!(plugin = %name, "failed to prepare plugin: {err}");
                    live.plugins.insert(name, Arc::from(plugin));
                }
            }
        }

        for service in std::mem::take(&mut self.services) {
            live.services.push(service.clone());
            let mut service = service;
            fill_defaults(&mut service);
            pool.add(Arc::new(service)).await;
        }

        let live = Arc::new(Mutex::new(live));
        if let Some(path) = reload_source {
            if live.lock().await.reload_enabled() {
                pool.enable_hot_reload();
                match reload::spawn(path, Arc::clone(&live), Arc::clone(pool), ctx.clone()) {
                    Ok(_watcher) => {}
                    Err(err) => warn!("configuration reload disabled: {err}"),
                }
            }
        }

        pool.start_all(ctx).await;
        pool.terminate().await;

        for (name, plugin) in live.lock().await.plugins.drain() {
            debug!(plugin = %name, "closing plugin");
            plugin.close();
        }
    }
}

/// The running system's view of its configuration, kept current by the
/// reload controller so successive diffs see earlier hot-adds.
#[derive(Default)]
pub(crate) struct LiveConfig {
    pub(crate) services: Vec<Executable>,
    pub(crate) plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl LiveConfig {
    pub(crate) fn reload_enabled(&self) -> bool {
        self.plugins
            .get("assist")
            .and_then(|plugin| plugin.as_any().downcast_ref::<Assist>())
            .is_some_and(|assist| assist.config_reload)
    }
}

/// Fills the documented defaults of a service definition.
///
/// A zero restart budget becomes infinite; callers wanting a single run set
/// the budget explicitly through the library API.
pub fn fill_defaults(service: &mut Executable) {
    if service.restart_timeout.is_zero() {
        service.restart_timeout = Duration::from_secs(6);
    }
    if service.restart == 0 {
        service.restart = -1;
    }
    if service.stop_timeout.is_zero() {
        service.stop_timeout = Duration::from_secs(3);
    }
    if service.name.is_empty() {
        service.name = names::random_label();
    }
}

/// Loads and merges every configuration source.
///
/// A source is a file or a directory; directories contribute every
/// top-level `*.yml`/`*.yaml` entry (non-recursive).
pub fn load_config<P: AsRef<Path>>(locations: &[P]) -> Result<Config, ConfigError> {
    let mut merged = Config::default();
    for location in locations {
        let location = location.as_ref();
        let metadata = std::fs::metadata(location).map_err(|source| ConfigError::Io {
            path: location.to_path_buf(),
            source,
        })?;

        let files = if metadata.is_dir() {
            list_yaml_files(location)?
        } else {
            vec![location.to_path_buf()]
        };

        for file in files {
            let config = parse_file(&file)?;
            merged.merge_from(config)?;
        }
    }
    Ok(merged)
}

/// Parses a single configuration file and builds its plugins.
pub(crate) fn parse_file(path: &Path) -> Result<Config, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config =
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.load_plugins();
    Ok(config)
}

fn list_yaml_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
