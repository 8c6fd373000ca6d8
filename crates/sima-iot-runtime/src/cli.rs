//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sima_iot_core::ChannelKind;

#[derive(Parser)]
#[command(
    name = "sima-iot",
    about = "Live sensor stream monitor with simulation failover"
)]
pub struct Cli {
    /// TOML config file (flags and environment override it)
    #[arg(long, short = 'c', global = true, env = "SIMA_IOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a session and read control commands from stdin
    Monitor(MonitorOpts),
    /// Run the failover generator offline and write a CSV
    Simulate(SimulateOpts),
}

#[derive(clap::Args, Debug, Default)]
pub struct MonitorOpts {
    /// WebSocket stream base URL; `?pid=<resource>` is appended
    #[arg(long, env = "SIMA_IOT_STREAM_URL")]
    pub stream_url: Option<String>,

    /// Replay frames from a capture file instead of the live stream
    #[arg(long)]
    pub replay_file: Option<PathBuf>,

    /// Resource (project/site) id
    #[arg(long, short = 'r', env = "SIMA_IOT_RESOURCE")]
    pub resource: Option<String>,

    /// Enabled channels, comma separated (temp,humid,light,co2,noise)
    #[arg(long = "channels", value_delimiter = ',')]
    pub channels: Vec<ChannelKind>,

    /// Readings kept per channel
    #[arg(long)]
    pub channel_capacity: Option<usize>,

    /// Readings kept in the merged flat log
    #[arg(long)]
    pub flat_capacity: Option<usize>,

    /// Live subscription timeout in milliseconds; elapsing fails over
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Simulator tick interval in milliseconds
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,

    /// Simulator seed (random per failover when unset)
    #[arg(long, env = "SIMA_IOT_SEED")]
    pub seed: Option<u64>,

    /// Arrival-rate window in milliseconds
    #[arg(long)]
    pub rate_window_ms: Option<u64>,

    /// Periodic report interval in milliseconds (0 disables)
    #[arg(long)]
    pub report_interval_ms: Option<u64>,

    /// Directory for `export`
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Connect immediately instead of waiting for a `connect` command
    #[arg(long)]
    pub connect: bool,
}

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    /// Number of generator ticks
    #[arg(long, default_value = "60")]
    pub ticks: u64,

    /// Generator seed
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Resource id written into every row
    #[arg(long, short = 'r')]
    pub resource: Option<String>,

    /// Enabled channels, comma separated
    #[arg(long = "channels", value_delimiter = ',')]
    pub channels: Vec<ChannelKind>,

    /// Timestamp of the first tick (epoch milliseconds)
    #[arg(long, default_value = "1700000000000")]
    pub start_ms: i64,

    /// Output file (stdout when omitted)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}
