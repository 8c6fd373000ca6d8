//! sima-iot: live sensor stream monitor runtime binary.
//! Runs one session against a WebSocket stream (or a replayed capture) and
//! fails over to the local generator when the stream is unavailable.

use clap::Parser;
use sima_iot_runtime::{cli, config, monitor, simulate_cmd};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("SIMA_IOT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::RuntimeConfig::load(args.config.as_deref())?;

    match args.command {
        cli::Command::Monitor(opts) => {
            config.apply_overrides(&opts);
            config.validate()?;
            monitor::run_monitor(config, opts.connect).await?;
        }
        cli::Command::Simulate(opts) => {
            config.validate()?;
            simulate_cmd::run_simulate(&opts, &config)?;
        }
    }

    Ok(())
}
