//! `sima-iot monitor`: the single-task session loop.
//!
//! One `select!` multiplexes producer events, stdin commands, the report
//! timer and shutdown signals. The session is only ever touched from here.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::config::RuntimeConfig;
use crate::control::{self, Outcome};
use crate::session::Session;
use crate::source::StreamSource;

pub async fn run_monitor(config: RuntimeConfig, connect_on_start: bool) -> anyhow::Result<()> {
    let source = StreamSource::from_config(&config)?;
    tracing::info!(
        source = source.describe(),
        resource = %config.resource_id,
        "monitor starting"
    );
    let mut session = Session::new(source, &config);
    if connect_on_start {
        session.connect().await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut report = config.report_interval().map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            Some(event) = session.next_event() => {
                session.handle_event(event);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match control::parse_command(&line) {
                    Ok(Some(cmd)) => match control::execute(&mut session, cmd, &config.export_dir).await {
                        Outcome::Reply(text) => println!("{text}"),
                        Outcome::Quit => break,
                    },
                    Ok(None) => {}
                    Err(e) => println!("error: {e}"),
                },
                Ok(None) => {
                    tracing::debug!("stdin closed; commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed; commands disabled");
                    stdin_open = false;
                }
            },
            () = next_report(&mut report) => {
                println!("{}", control::render_report_line(&session));
            }
        }
    }

    session.disconnect();
    tracing::info!("monitor stopped");
    Ok(())
}

async fn next_report(report: &mut Option<Interval>) {
    match report {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot register SIGTERM handler");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c, shutting down");
    }
}
