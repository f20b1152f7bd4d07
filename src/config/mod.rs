//! Configuration: model, loading, merging, defaults, and run wiring.
//!
//! ## Contents
//! - [`Config`], [`load_config`], [`fill_defaults`] — the YAML model and
//!   multi-source loader (`config.rs`).
//! - [`duration`] — serde support for human duration strings.
//! - `env_file` — `KEY=VALUE` environment files.

#[allow(clippy::module_inception)]
mod config;
pub mod duration;
pub(crate) mod env_file;

pub use config::{Config, fill_defaults, load_config};
pub(crate) use config::{LiveConfig, parse_file};
