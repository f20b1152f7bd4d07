//! # Error types used by the procvisor runtime.
//!
//! This module defines the error enums for the main failure domains:
//!
//! - [`ConfigError`] configuration loading and merging failures (fatal at startup).
//! - [`RunError`] failures of a single child-process execution (feed the restart policy).
//! - [`PluginError`] observer-plugin decode/prepare/merge failures (plugin is skipped).
//! - [`ReloadError`] configuration-watcher failures (logged, live state unchanged).
//! - [`SubmitError`] hot-reload channel failures.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced while loading or merging configuration.
///
/// These are fatal for the CLI: a broken configuration never reaches the pool.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading a configuration source failed.
    #[error("read {path}: {source}")]
    Io {
        /// The file or directory that could not be read.
        path: PathBuf,
        source: io::Error,
    },

    /// A configuration file is not valid YAML or violates the services schema.
    #[error("parse {path}: {source}")]
    Parse {
        /// The offending file.
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Two sources configure the same plugin with incompatible values.
    #[error("merge plugin '{plugin}': {source}")]
    PluginMerge {
        /// The plugin whose configurations could not be reconciled.
        plugin: String,
        source: PluginError,
    },
}

/// # Result of one child-process execution.
///
/// `Ok(())` is a clean exit; every variant here counts as a completed run
/// with an error, and the restart policy decides what happens next.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunError {
    /// The child could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command that was attempted.
        command: String,
        source: io::Error,
    },

    /// Waiting on the child failed.
    #[error("wait for child: {0}")]
    Wait(#[source] io::Error),

    /// The child exited with a non-zero status code.
    #[error("exited with code {code}")]
    Exited { code: i32 },

    /// The child was terminated by a signal.
    #[error("terminated by signal {signal}")]
    Signaled { signal: i32 },
}

/// # Errors produced by observer plugins.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin configuration did not decode into the plugin's schema.
    #[error("decode: {0}")]
    Decode(#[source] serde_yaml::Error),

    /// Two instances of the same plugin carry incompatible values.
    #[error("{reason}")]
    Merge { reason: String },

    /// The plugin failed to initialize its internal state.
    #[error("prepare: {reason}")]
    Prepare { reason: String },
}

/// # Errors produced by the configuration reload controller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReloadError {
    /// The filesystem watcher could not be created or attached.
    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),
}

/// Error returned by [`ReloadHandle::submit`](crate::pool::ReloadHandle::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The pool's reload listener is gone (pool finished or terminating).
    #[error("reload channel closed")]
    Closed,
}
