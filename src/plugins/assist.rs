//! Machine identity and the hot-reload gate.
//!
//! The `assist` plugin carries the host's identity for control surfaces and
//! owns the `configReload` flag: configuration hot reload is active only
//! while an `assist` section with `configReload: true` is present.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{PluginError, RunError};
use crate::plugins::Plugin;
use crate::pool::{Handler, Pool, Runnable};

/// Credentials of an operator allowed to use the control surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Configuration of the `assist` plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assist {
    /// Human-readable machine name.
    #[serde(default)]
    pub machine: String,

    /// Address the machine is reachable at.
    #[serde(default)]
    pub ip: String,

    /// Whether configuration hot reload is active.
    #[serde(rename = "configReload", default)]
    pub config_reload: bool,

    /// Operators allowed to use the control surfaces.
    #[serde(default)]
    pub users: Vec<UserInfo>,
}

pub(super) fn build(raw: serde_yaml::Value) -> Result<Box<dyn Plugin>, PluginError> {
    let assist: Assist = serde_yaml::from_value(raw).map_err(PluginError::Decode)?;
    Ok(Box::new(assist))
}

#[async_trait]
impl Plugin for Assist {
    async fn prepare(
        &mut self,
        _ctx: &CancellationToken,
        _pool: &Arc<Pool>,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn merge_from(&mut self, other: &dyn Plugin) -> Result<(), PluginError> {
        let other = other
            .as_any()
            .downcast_ref::<Assist>()
            .ok_or_else(|| PluginError::Merge {
                reason: "mismatched plugin type".into(),
            })?;

        if self.machine.is_empty() {
            self.machine = other.machine.clone();
        }
        if self.machine != other.machine {
            return Err(PluginError::Merge {
                reason: "different machine name".into(),
            });
        }
        if self.ip.is_empty() {
            self.ip = other.ip.clone();
        }
        if self.ip != other.ip {
            return Err(PluginError::Merge {
                reason: "different machine ip".into(),
            });
        }
        for user in &other.users {
            if !self.users.contains(user) {
                self.users.push(user.clone());
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl Handler for Assist {
    async fn on_spawned(&self, _instance: &Arc<Runnable>) {}
    async fn on_started(&self, _instance: &Arc<Runnable>) {}
    async fn on_stopped(&self, _instance: &Arc<Runnable>, _error: Option<&RunError>) {}
    async fn on_finished(&self, _instance: &Arc<Runnable>) {}

    fn name(&self) -> &'static str {
        "assist"
    }
}
