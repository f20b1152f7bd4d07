//! Machine registration record.
//!
//! The `reginfo` plugin collects the machine identity that registration
//! adapters (service catalogs, inventory endpoints) read when announcing
//! this supervisor.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{PluginError, RunError};
use crate::plugins::{Plugin, UserInfo};
use crate::pool::{Handler, Pool, Runnable};

/// Configuration of the `reginfo` plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegInfo {
    /// Human-readable machine name.
    #[serde(default)]
    pub machine: String,

    /// Address the machine is reachable at.
    #[serde(default)]
    pub ip: String,

    /// Operators associated with this machine.
    #[serde(default)]
    pub users: Vec<UserInfo>,
}

pub(super) fn build(raw: serde_yaml::Value) -> Result<Box<dyn Plugin>, PluginError> {
    let reginfo: RegInfo = serde_yaml::from_value(raw).map_err(PluginError::Decode)?;
    Ok(Box::new(reginfo))
}

#[async_trait]
impl Plugin for RegInfo {
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
            .downcast_ref::<RegInfo>()
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
impl Handler for RegInfo {
    async fn on_spawned(&self, _instance: &Arc<Runnable>) {}
    async fn on_started(&self, _instance: &Arc<Runnable>) {}
    async fn on_stopped(&self, _instance: &Arc<Runnable>, _error: Option<&RunError>) {}
    async fn on_finished(&self, _instance: &Arc<Runnable>) {}

    fn name(&self) -> &'static str {
        "reginfo"
    }
}
