//! Command-line surface.
//!
//! Two subcommands: `run` supervises a single ad-hoc executable described by
//! flags (optionally just emitting the equivalent YAML), `start` runs the
//! merged configuration from one or more files/directories.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::fill_defaults;
use crate::pool::Executable;

#[derive(Parser, Debug)]
#[command(name = "procvisor", version, about = "Declarative process supervisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single executable under supervision.
    Run(RunArgs),
    /// Start the supervisor from configuration files.
    Start(StartArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Generate the equivalent YAML configuration instead of running.
    #[arg(long)]
    pub generate: bool,

    /// Restart count (negative means infinity).
    #[arg(short = 'r', long, default_value_t = -1)]
    pub restart_count: i64,

    /// Delay before restart.
    #[arg(short = 'd', long, default_value = "5s", value_parser = parse_duration)]
    pub restart_delay: Duration,

    /// Timeout for graceful shutdown.
    #[arg(short = 'g', long, default_value = "5s", value_parser = parse_duration)]
    pub graceful_timeout: Duration,

    /// Label name for the executable. Default: autogenerated.
    #[arg(short = 'l', long)]
    pub label: Option<String>,

    /// Workdir for the executable.
    #[arg(short = 'w', long)]
    pub workdir: Option<String>,

    /// Additional environment variables (KEY=VALUE, repeatable).
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Path to the executable.
    pub command: String,

    /// Arguments to the executable.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Source files and/or directories with YAML files (.yml or .yaml).
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

impl RunArgs {
    /// Builds the service definition described by the flags, with defaults
    /// filled.
    pub fn into_executable(self) -> Executable {
        let mut service = Executable {
            name: self.label.unwrap_or_default(),
            args: self.args,
            environment: self.env.into_iter().collect(),
            work_dir: self.workdir.unwrap_or_default(),
            stop_timeout: self.graceful_timeout,
            restart_timeout: self.restart_delay,
            restart: self.restart_count,
            ..Executable::new(self.command)
        };
        fill_defaults(&mut service);
        service
    }
}

// duration_str's error type does not line up with what clap's value parser
// expects, hence the wrapper.
fn parse_duration(arg: &str) -> Result<Duration, String> {
    duration_str::parse(arg).map_err(|err| err.to_string())
}

fn parse_env_pair(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{arg}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_build_an_executable() {
        let cli = Cli::parse_from([
            "procvisor", "run", "-l", "worker", "-r", "3", "-d", "1s", "-e", "A=1", "-e", "B=2",
            "--", "/bin/server", "--port", "8080",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        let service = args.into_executable();
        assert_eq!(service.name, "worker");
        assert_eq!(service.command, "/bin/server");
        assert_eq!(service.args, vec!["--port", "8080"]);
        assert_eq!(service.restart, 3);
        assert_eq!(service.restart_timeout, Duration::from_secs(1));
        assert_eq!(service.environment["A"], "1");
        assert_eq!(service.environment["B"], "2");
    }

    #[test]
    fn run_defaults_match_the_documented_flags() {
        let cli = Cli::parse_from(["procvisor", "run", "/bin/true"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.restart_count, -1);
        assert_eq!(args.restart_delay, Duration::from_secs(5));
        assert_eq!(args.graceful_timeout, Duration::from_secs(5));
        let service = args.into_executable();
        assert!(!service.name.is_empty());
    }

    #[test]
    fn start_requires_a_source() {
        assert!(Cli::try_parse_from(["procvisor", "start"]).is_err());
    }
}
