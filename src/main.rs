use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use procvisor::{Cli, Command, Config, Pool, load_config, wait_for_shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run(args) => {
            let generate = args.generate;
            let config = Config::with_services(vec![args.into_executable()]);
            if generate {
                print!(
                    "{}",
                    serde_yaml::to_string(&config).context("failed to render configuration")?
                );
                return Ok(());
            }
            run_config(config, None).await;
        }
        Command::Start(args) => {
            let config = load_config(&args.sources).context("failed to load configuration")?;
            let reload_source = single_file_source(&args.sources);
            run_config(config, reload_source).await;
        }
    }
    Ok(())
}

async fn run_config(config: Config, reload_source: Option<PathBuf>) {
    let root = CancellationToken::new();
    let signal_token = root.clone();
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    let pool = Pool::new();
    config.run(&pool, &root, reload_source).await;
}

/// Hot reload only works against exactly one file source.
fn single_file_source(sources: &[PathBuf]) -> Option<PathBuf> {
    match sources {
        [only] if only.is_file() => Some(only.clone()),
        _ => None,
    }
}
