//! # Service definition and one-shot execution.
//!
//! [`Executable`] is the immutable, declarative description of a child
//! process, the serde model of one `services:` entry. It knows how to run
//! itself exactly once: resolve the effective environment, spawn the child
//! in its own process group, fan out its output, and wait for exit or
//! cancellation with graceful SIGINT → SIGKILL termination.
//!
//! The restart policy lives one level up, in
//! [`Runnable`](crate::pool::Runnable).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::env_file;
use crate::error::RunError;
use crate::pool::output::{OutputSinks, spawn_pumps};
use crate::pool::{Pool, Runnable};

/// Declarative description of a supervised child process.
///
/// Field names mirror the YAML schema; unknown keys in a service entry are
/// a configuration error. Once registered in a pool the value is shared
/// immutably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Executable {
    /// Human-readable label. Filled with a random `adjective-noun` when empty.
    #[serde(rename = "label", default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Path or name of the program to run.
    pub command: String,

    /// Positional arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Environment overrides; win over the parent environment and `envFiles`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// `KEY=VALUE` files applied in order; unreadable files are skipped.
    #[serde(rename = "envFiles", default, skip_serializing_if = "Vec::is_empty")]
    pub env_files: Vec<String>,

    /// Working directory; empty means inherit.
    #[serde(rename = "workdir", default, skip_serializing_if = "String::is_empty")]
    pub work_dir: String,

    /// Bound on the graceful shutdown wait before the child is killed.
    #[serde(
        rename = "stop_timeout",
        default,
        with = "crate::config::duration",
        skip_serializing_if = "Duration::is_zero"
    )]
    pub stop_timeout: Duration,

    /// Delay between restarts.
    #[serde(
        rename = "restart_delay",
        default,
        with = "crate::config::duration",
        skip_serializing_if = "Duration::is_zero"
    )]
    pub restart_timeout: Duration,

    /// Restart budget: -1 is infinite, a positive N allows N restarts after
    /// the first run.
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub restart: i64,

    /// Log file appended with the child's verbatim output; relative paths
    /// resolve against `workdir`.
    #[serde(rename = "logFile", default, skip_serializing_if = "String::is_empty")]
    pub log_file: String,

    /// Mirror the child's stdout to the parent's stdout without a prefix.
    #[serde(rename = "raw", default, skip_serializing_if = "std::ops::Not::not")]
    pub raw_output: bool,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

impl Executable {
    /// Creates a definition for `command` with everything else unset.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            command: command.into(),
            args: Vec::new(),
            environment: HashMap::new(),
            env_files: Vec::new(),
            work_dir: String::new(),
            stop_timeout: Duration::ZERO,
            restart_timeout: Duration::ZERO,
            restart: 0,
            log_file: String::new(),
            raw_output: false,
        }
    }

    /// Sets the label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a positional argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Starts a supervised instance of this definition.
    ///
    /// The restart loop runs on the pool's task tracker; the returned
    /// instance carries its own cancellation handle derived from `ctx`.
    pub fn start(self: Arc<Self>, ctx: &CancellationToken, pool: &Arc<Pool>) -> Arc<Runnable> {
        let instance = Runnable::new(self, ctx.child_token(), Arc::downgrade(pool));
        pool.tracker().spawn(Arc::clone(&instance).run_loop());
        instance
    }

    /// Runs the child exactly once, honoring cancellation.
    ///
    /// On cancellation the child's process group receives SIGINT; if it does
    /// not exit within `stop_timeout` the group is killed. Returns the
    /// child's termination result.
    pub(crate) async fn run(&self, ctx: &CancellationToken) -> Result<(), RunError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env_clear()
            .envs(self.effective_environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.work_dir.is_empty() {
            cmd.current_dir(&self.work_dir);
        }
        // Own process group: a terminal SIGINT to the parent must not reach
        // the child directly, and graceful stop signals the whole group.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!(service = %self.name, command = %self.command, "failed to start: {source}");
                return Err(RunError::Spawn {
                    command: self.command.clone(),
                    source,
                });
            }
        };
        let pid = child.id();
        info!(service = %self.name, pid, "started");

        let sinks = Arc::new(OutputSinks::open(self).await);
        let pumps = spawn_pumps(&mut child, sinks);

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = ctx.cancelled() => None,
        };
        let result = match exited {
            Some(status) => exit_result(status),
            None => self.stop_or_kill(&mut child, pid).await,
        };
        for pump in pumps {
            let _ = pump.await;
        }
        result
    }

    /// Graceful termination: interrupt the group, wait `stop_timeout`, kill.
    async fn stop_or_kill(&self, child: &mut Child, pid: Option<u32>) -> Result<(), RunError> {
        debug!(service = %self.name, "sending interrupt");
        self.signal_group(child, pid, GroupSignal::Interrupt);

        match time::timeout(self.stop_timeout, child.wait()).await {
            Ok(status) => {
                debug!(service = %self.name, "stopped gracefully");
                exit_result(status)
            }
            Err(_elapsed) => {
                warn!(
                    service = %self.name,
                    timeout = ?self.stop_timeout,
                    "graceful stop timed out, killing"
                );
                self.signal_group(child, pid, GroupSignal::Kill);
                exit_result(child.wait().await)
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, _child: &mut Child, pid: Option<u32>, signal: GroupSignal) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pid) = pid else { return };
        let signal = match signal {
            GroupSignal::Interrupt => Signal::SIGINT,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        if let Err(err) = killpg(Pid::from_raw(pid as i32), signal) {
            warn!(service = %self.name, "failed to send {signal:?}: {err}");
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, child: &mut Child, _pid: Option<u32>, _signal: GroupSignal) {
        if let Err(err) = child.start_kill() {
            warn!(service = %self.name, "failed to kill child: {err}");
        }
    }

    /// Parent environment, overlaid by each env file in order, overlaid by
    /// the explicit overrides.
    fn effective_environment(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = std::env::vars().collect();
        for file in &self.env_files {
            match env_file::parse(Path::new(file)) {
                Ok(vars) => env.extend(vars),
                Err(err) => {
                    warn!(service = %self.name, file = %file, "skipping environment file: {err}");
                }
            }
        }
        env.extend(
            self.environment
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        env
    }

    /// Absolute log file path, or `None` when logging to file is off.
    pub(crate) fn resolved_log_file(&self) -> Option<PathBuf> {
        if self.log_file.is_empty() {
            return None;
        }
        let path = Path::new(&self.log_file);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        let base = if self.work_dir.is_empty() {
            std::env::current_dir().unwrap_or_default()
        } else {
            PathBuf::from(&self.work_dir)
        };
        Some(base.join(path))
    }
}

enum GroupSignal {
    Interrupt,
    Kill,
}

fn exit_result(status: std::io::Result<std::process::ExitStatus>) -> Result<(), RunError> {
    let status = status.map_err(RunError::Wait)?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(RunError::Exited { code }),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                Err(RunError::Signaled {
                    signal: status.signal().unwrap_or_default(),
                })
            }
            #[cfg(not(unix))]
            {
                Err(RunError::Exited { code: -1 })
            }
        }
    }
}
