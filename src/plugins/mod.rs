//! # Observer plugins.
//!
//! Plugins are lifecycle handlers with a configuration of their own: every
//! top-level configuration key other than `services` names a plugin, and
//! its value is decoded by the plugin itself (two-phase: generic YAML value
//! first, typed decode second). A sequence value is wrapped into
//! `{ "<ITEMS>": <sequence> }` before decoding.
//!
//! The factory registry is populated at process start and never mutated at
//! runtime; unknown keys are logged and skipped by the loader.
//!
//! Built-ins:
//! - [`Assist`] — machine identity plus the `configReload` gate for hot
//!   reload.
//! - [`RegInfo`] — machine registration record for external registration
//!   adapters.

mod assist;
mod reginfo;

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use assist::{Assist, UserInfo};
pub use reginfo::RegInfo;

use crate::error::PluginError;
use crate::pool::{Handler, Pool};

/// Key under which a top-level sequence is presented to a plugin decoder.
const ITEMS_KEY: &str = "<ITEMS>";

/// Contract for observer plugins.
///
/// A plugin is a [`Handler`] that additionally knows how to initialize
/// itself against a pool, merge with another instance of the same plugin
/// from a different configuration source, and release resources on
/// shutdown.
#[async_trait]
pub trait Plugin: Handler {
    /// Prepares internal state; called once before the plugin starts
    /// receiving events. A failing plugin is not registered as a handler.
    async fn prepare(
        &mut self,
        ctx: &CancellationToken,
        pool: &Arc<Pool>,
    ) -> Result<(), PluginError>;

    /// Merges configuration from another instance of the same plugin.
    ///
    /// `other` always has the same concrete type as `self`.
    fn merge_from(&mut self, other: &dyn Plugin) -> Result<(), PluginError>;

    /// Releases resources held by the plugin.
    fn close(&self) {}

    /// Downcast support for [`merge_from`](Self::merge_from).
    fn as_any(&self) -> &dyn Any;
}

type PluginFactory = fn(serde_yaml::Value) -> Result<Box<dyn Plugin>, PluginError>;

fn registry() -> &'static HashMap<&'static str, PluginFactory> {
    static REGISTRY: OnceLock<HashMap<&'static str, PluginFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut factories: HashMap<&'static str, PluginFactory> = HashMap::new();
        factories.insert("assist", assist::build);
        factories.insert("reginfo", reginfo::build);
        factories
    })
}

/// Builds and decodes the plugin registered under `name`.
///
/// Returns `None` for unregistered names.
pub fn build(name: &str, raw: serde_yaml::Value) -> Option<Result<Box<dyn Plugin>, PluginError>> {
    let factory = registry().get(name)?;
    let raw = if raw.is_sequence() {
        let mut wrapped = serde_yaml::Mapping::new();
        wrapped.insert(serde_yaml::Value::from(ITEMS_KEY), raw);
        serde_yaml::Value::Mapping(wrapped)
    } else {
        raw
    };
    Some(factory(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plugin_is_not_built() {
        assert!(build("nope", serde_yaml::Value::Null).is_none());
    }

    #[test]
    fn sequence_config_is_wrapped_before_decoding() {
        let raw: serde_yaml::Value = serde_yaml::from_str("- a\n- b\n").unwrap();
        // The assist schema has no `<ITEMS>` field, so a wrapped sequence
        // must surface as a decode error rather than a panic.
        let result = build("assist", raw).unwrap();
        assert!(result.is_err());
    }
}
