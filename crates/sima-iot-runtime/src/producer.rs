//! Producer tasks feeding the session loop.
//!
//! Exactly one producer is active per session: either the connector pump
//! (live frames) or the simulator ticker. Both only send [`ProducerEvent`]s
//! tagged with the session epoch at spawn time; the session owns every
//! buffer mutation and drops events whose epoch is stale.

use std::time::Duration;

use sima_iot_core::TimestampMs;
use sima_iot_source_stream::{StreamItem, Subscription, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Generation counter identifying the producer an event came from.
pub type Epoch = u64;

/// Session event queue depth.
pub const EVENT_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ProducerEvent {
    pub epoch: Epoch,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Raw live frame and the wall-clock time it arrived.
    Frame { raw: String, arrival_ms: TimestampMs },
    /// The live transport failed; sent at most once per pump.
    TransportLost(TransportError),
    /// Simulator tick.
    Tick { now_ms: TimestampMs },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerKind {
    Pump,
    Ticker,
}

/// Handle to the running producer task.
#[derive(Debug)]
pub struct ProducerHandle {
    kind: ProducerKind,
    epoch: Epoch,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProducerHandle {
    pub fn kind(&self) -> ProducerKind {
        self.kind
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Cancel and abort the task. Returns without waiting; whatever the task
    /// already queued carries a stale epoch once the session moves on.
    pub fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
        tracing::debug!(kind = ?self.kind, epoch = self.epoch, "producer stopped");
    }
}

pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

// ─── Connector pump ─────────────────────────────────────────────────

/// Forward subscription items into the session queue until the transport
/// ends or the handle is stopped.
pub fn spawn_pump(
    mut subscription: Subscription,
    epoch: Epoch,
    events: mpsc::Sender<ProducerEvent>,
) -> ProducerHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                () = token.cancelled() => break,
                item = subscription.next() => item,
            };
            let kind = match item {
                Some(StreamItem::Frame(raw)) => EventKind::Frame {
                    raw,
                    arrival_ms: now_ms(),
                },
                Some(StreamItem::Lost(err)) => EventKind::TransportLost(err),
                None => EventKind::TransportLost(TransportError::Closed),
            };
            let terminal = matches!(kind, EventKind::TransportLost(_));
            if events.send(ProducerEvent { epoch, kind }).await.is_err() || terminal {
                break;
            }
        }
        subscription.close();
    });

    ProducerHandle {
        kind: ProducerKind::Pump,
        epoch,
        cancel,
        task,
    }
}

// ─── Simulator ticker ───────────────────────────────────────────────

/// Emit a [`EventKind::Tick`] every `period`, first one after one period.
pub fn spawn_ticker(
    period: Duration,
    epoch: Epoch,
    events: mpsc::Sender<ProducerEvent>,
) -> ProducerHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let event = ProducerEvent {
                epoch,
                kind: EventKind::Tick { now_ms: now_ms() },
            };
            if events.send(event).await.is_err() {
                break;
            }
        }
    });

    ProducerHandle {
        kind: ProducerKind::Ticker,
        epoch,
        cancel,
        task,
    }
}
