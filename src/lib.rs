//! # procvisor
//!
//! **Procvisor** is a declarative process supervisor: it launches
//! long-running child processes from a YAML description, restarts them on
//! exit under a per-service budget, terminates them gracefully
//! (interrupt, then kill), fans lifecycle events out to observer plugins,
//! and can hot-add services and plugins from configuration changes while
//! running.
//!
//! | Area              | Description                                                  | Key types / traits          |
//! |-------------------|--------------------------------------------------------------|-----------------------------|
//! | **Definitions**   | Declarative child-process descriptions.                      | [`Executable`]              |
//! | **Instances**     | Restart loop and graceful termination per service.           | [`Runnable`]                |
//! | **Coordination**  | Registries, snapshots, event fanout, shutdown.               | [`Pool`], [`Handler`]       |
//! | **Plugins**       | Observers with their own configuration sections.             | [`Plugin`], [`Assist`]      |
//! | **Configuration** | Multi-source YAML loading, merging, defaults.                | [`Config`], [`load_config`] |
//! | **Errors**        | Typed errors per failure domain.                             | [`RunError`], [`ConfigError`] |
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use procvisor::{Executable, Pool, fill_defaults};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut service = Executable::new("ping").arg("localhost").with_name("pinger");
//!     fill_defaults(&mut service);
//!
//!     let pool = Pool::new();
//!     let root = CancellationToken::new();
//!     pool.add(Arc::new(service)).await;
//!
//!     // Blocks until every instance finished or `root` is cancelled.
//!     pool.start_all(&root).await;
//!     pool.terminate().await;
//! }
//! ```

mod cli;
pub mod config;
mod error;
mod names;
pub mod plugins;
pub mod pool;
mod reload;
mod signals;

// ---- Public re-exports ----

pub use cli::{Cli, Command, RunArgs, StartArgs};
pub use config::{Config, fill_defaults, load_config};
pub use error::{ConfigError, PluginError, ReloadError, RunError, SubmitError};
pub use names::random_label;
pub use plugins::{Assist, Plugin, RegInfo, UserInfo};
pub use pool::{Executable, Handler, Pool, ReloadHandle, Runnable};
pub use signals::wait_for_shutdown_signal;
