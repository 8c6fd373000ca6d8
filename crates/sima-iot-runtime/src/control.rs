//! Line-oriented control commands for the monitor.
//!
//! Stands in for the resource selector, channel toggles and dashboard
//! widgets: each command maps to one session operation or view.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sima_iot_core::{ChannelKind, Kpi, ResourceId};
use sima_iot_source_stream::Connector;
use thiserror::Error;

use crate::session::Session;

/// Rows shown by `recent` without an explicit count.
pub const DEFAULT_RECENT_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    Resource(ResourceId),
    Enable(ChannelKind),
    Disable(ChannelKind),
    Kpi(Option<ChannelKind>),
    Rate,
    Report,
    Recent(usize),
    Export(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let channel = |name: &'static str| -> Result<ChannelKind, CommandError> {
        arg.ok_or(CommandError::MissingArgument(name))?
            .parse()
            .map_err(|e: sima_iot_core::ParseError| CommandError::InvalidArgument(e.to_string()))
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "resource" => Command::Resource(ResourceId::new(
            arg.ok_or(CommandError::MissingArgument("resource"))?,
        )),
        "enable" => Command::Enable(channel("enable")?),
        "disable" => Command::Disable(channel("disable")?),
        "kpi" => match arg {
            Some(_) => Command::Kpi(Some(channel("kpi")?)),
            None => Command::Kpi(None),
        },
        "rate" => Command::Rate,
        "report" => Command::Report,
        "recent" => match arg {
            Some(n) => Command::Recent(
                n.parse()
                    .map_err(|_| CommandError::InvalidArgument(n.to_string()))?,
            ),
            None => Command::Recent(DEFAULT_RECENT_ROWS),
        },
        "export" => Command::Export(arg.map(PathBuf::from)),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

/// Run one command against the session.
pub async fn execute<C: Connector>(
    session: &mut Session<C>,
    cmd: Command,
    export_dir: &Path,
) -> Outcome {
    let reply = match cmd {
        Command::Connect => {
            let mode = session.connect().await;
            format!("status: {}", mode.status_text())
        }
        Command::Disconnect => {
            session.disconnect();
            format!("status: {}", session.status())
        }
        Command::Resource(id) => {
            if session.select_resource(id) {
                format!(
                    "resource: {} (status: {})",
                    session.resource_id(),
                    session.status()
                )
            } else {
                format!("resource: {} (unchanged)", session.resource_id())
            }
        }
        Command::Enable(kind) => {
            session.set_channel_enabled(kind, true);
            format!("enabled {kind}")
        }
        Command::Disable(kind) => {
            session.set_channel_enabled(kind, false);
            format!("disabled {kind}")
        }
        Command::Kpi(Some(kind)) => render_kpi(kind, &session.kpi(kind)),
        Command::Kpi(None) => session
            .buffers()
            .enabled()
            .iter()
            .map(|k| render_kpi(*k, &session.kpi(*k)))
            .collect::<Vec<_>>()
            .join("\n"),
        Command::Rate => format!("{:.0} reads/min", session.arrival_rate()),
        Command::Report => match serde_json::to_string_pretty(&session.snapshot()) {
            Ok(json) => json,
            Err(e) => format!("error: {e}"),
        },
        Command::Recent(limit) => render_recent(session, limit),
        Command::Export(dir) => {
            let dir = dir.as_deref().unwrap_or(export_dir);
            match session.export_to_dir(dir) {
                Ok(path) => format!("exported {}", path.display()),
                Err(e) => {
                    tracing::warn!(error = %e, "export failed");
                    format!("export failed: {e}")
                }
            }
        }
        Command::Status => format!(
            "status: {} resource: {} readings: {}",
            session.status(),
            session.resource_id(),
            session.buffers().flat_len()
        ),
        Command::Help => HELP.to_string(),
        Command::Quit => return Outcome::Quit,
    };
    Outcome::Reply(reply)
}

const HELP: &str = "\
commands:
  connect | disconnect | status
  resource <id>
  enable <ch> | disable <ch>      (temp humid light co2 noise)
  kpi [ch] | rate | report | recent [n]
  export [dir]
  quit";

pub fn render_kpi(kind: ChannelKind, kpi: &Kpi) -> String {
    let [last, avg, min, max] = kpi.display(kind);
    format!("{kind:<5} last {last:>9}  avg {avg:>9}  min {min:>9}  max {max:>9}")
}

fn render_recent<C: Connector>(session: &Session<C>, limit: usize) -> String {
    let mut out = String::new();
    for r in session.recent(limit) {
        let _ = writeln!(
            out,
            "{}  {:<5} {}",
            sima_iot_core::export::iso_timestamp(r.timestamp_ms),
            r.channel,
            r.channel.format_value(r.value)
        );
    }
    if out.is_empty() {
        out.push_str("no readings");
    }
    out.trim_end().to_string()
}

/// One-line periodic report: status, latest value per enabled channel and
/// arrival rate.
pub fn render_report_line<C: Connector>(session: &Session<C>) -> String {
    let mut line = format!("[{}] {}", session.status(), session.resource_id());
    for kind in session.buffers().enabled() {
        let last = session
            .kpi(*kind)
            .last
            .map_or_else(|| "—".to_string(), |v| kind.format_value(v));
        let _ = write!(line, " | {kind} {last}");
    }
    let _ = write!(line, " | {:.0} reads/min", session.arrival_rate());
    line
}
