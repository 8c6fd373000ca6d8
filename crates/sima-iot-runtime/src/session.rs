//! Session controller: one resource, one active producer, owned buffers.
//!
//! All buffer mutation happens in [`Session::handle_event`] on the task
//! that owns the session. Producers only enqueue [`ProducerEvent`]s; each
//! carries the epoch current when its producer was spawned, and every
//! teardown bumps the epoch, so nothing a stopped producer queued can
//! reach the buffers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use sima_iot_core::{
    BufferManager, ChannelKind, ConnectionMode, ExportError, Generator, Kpi, ModeEvent,
    ModeTransition, PushOutcome, Reading, ResourceId, TimestampMs, export_file_name, parse_frame,
    transition_mode,
};
use sima_iot_source_stream::Connector;
use tokio::sync::{mpsc, watch};

use crate::config::RuntimeConfig;
use crate::producer::{
    EVENT_QUEUE_DEPTH, Epoch, EventKind, ProducerEvent, ProducerHandle, now_ms, spawn_pump,
    spawn_ticker,
};

pub struct Session<C: Connector> {
    connector: C,
    buffers: BufferManager,
    mode: ConnectionMode,
    mode_tx: watch::Sender<ConnectionMode>,
    epoch: Epoch,
    producer: Option<ProducerHandle>,
    events_tx: mpsc::Sender<ProducerEvent>,
    events_rx: mpsc::Receiver<ProducerEvent>,
    generator: Option<Generator>,
    connect_timeout: Duration,
    tick_interval: Duration,
    seed: Option<u64>,
    rate_window_ms: u64,
    dropped_frames: u64,
}

impl<C: Connector> Session<C> {
    /// `config` must already be validated.
    pub fn new(connector: C, config: &RuntimeConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (mode_tx, _) = watch::channel(ConnectionMode::Disconnected);
        Self {
            connector,
            buffers: BufferManager::new(
                config.resource(),
                config.buffer_config(),
                config.channels.iter().copied(),
            ),
            mode: ConnectionMode::Disconnected,
            mode_tx,
            epoch: 0,
            producer: None,
            events_tx,
            events_rx,
            generator: None,
            connect_timeout: config.connect_timeout(),
            tick_interval: config.tick_interval(),
            seed: config.seed,
            rate_window_ms: config.rate_window_ms,
            dropped_frames: 0,
        }
    }

    // ─── Control ────────────────────────────────────────────────────

    /// Subscribe to the live source, falling back to simulation when the
    /// subscription fails or does not complete within the connect timeout.
    /// A no-op while already connected.
    pub async fn connect(&mut self) -> ConnectionMode {
        if self.mode.is_connected() {
            return self.mode;
        }
        self.epoch += 1;
        let resource_id = self.buffers.resource_id().clone();
        tracing::info!(resource = %resource_id, "connecting");

        let attempt =
            tokio::time::timeout(self.connect_timeout, self.connector.subscribe(&resource_id)).await;
        match attempt {
            Ok(Ok(subscription)) => {
                self.apply(ModeEvent::SubscribeSucceeded);
                self.producer = Some(spawn_pump(
                    subscription,
                    self.epoch,
                    self.events_tx.clone(),
                ));
            }
            Ok(Err(e)) => {
                tracing::warn!(resource = %resource_id, error = %e, "live subscription failed");
                self.apply(ModeEvent::SubscribeFailed);
            }
            Err(_) => {
                tracing::warn!(
                    resource = %resource_id,
                    timeout_ms = self.connect_timeout.as_millis(),
                    "live subscription timed out"
                );
                self.apply(ModeEvent::SubscribeFailed);
            }
        }
        self.mode
    }

    /// Stop the active producer. Buffers are kept.
    pub fn disconnect(&mut self) {
        self.apply(ModeEvent::DisconnectRequested);
    }

    /// Switch to another resource: stop the producer, clear all history and
    /// return to `Disconnected`. Returns `false` when `resource_id` is
    /// already selected.
    pub fn select_resource(&mut self, resource_id: ResourceId) -> bool {
        if &resource_id == self.buffers.resource_id() {
            return false;
        }
        self.apply(ModeEvent::ResourceChanged);
        tracing::info!(resource = %resource_id, "resource selected");
        self.buffers.reset(resource_id);
        true
    }

    pub fn set_channel_enabled(&mut self, kind: ChannelKind, enabled: bool) {
        self.buffers.set_enabled(kind, enabled);
        tracing::info!(channel = %kind, enabled, "channel toggled");
    }

    fn apply(&mut self, event: ModeEvent) -> ModeTransition {
        let from = self.mode;
        let t = transition_mode(from, event);
        if t.teardown {
            self.teardown();
        }
        if t.clear_buffers {
            self.buffers.clear();
        }
        if t.changed(from) {
            self.mode = t.next;
            self.mode_tx.send_replace(t.next);
            tracing::info!(
                resource = %self.buffers.resource_id(),
                from = %from,
                to = %t.next,
                event = ?event,
                "connection mode changed"
            );
        }
        if t.start_simulator {
            self.start_simulator();
        }
        t
    }

    fn teardown(&mut self) {
        self.epoch += 1;
        if let Some(producer) = self.producer.take() {
            producer.stop();
        }
        self.generator = None;
    }

    fn start_simulator(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.stop();
        }
        let seed = self.seed.unwrap_or_else(rand::random);
        let buffers = &self.buffers;
        self.generator = Some(Generator::with_start_values(seed, |k| buffers.last_value(k)));
        self.producer = Some(spawn_ticker(
            self.tick_interval,
            self.epoch,
            self.events_tx.clone(),
        ));
        tracing::info!(resource = %self.buffers.resource_id(), seed, "failover simulator started");
    }

    // ─── Event loop ─────────────────────────────────────────────────

    /// Wait for the next producer event.
    pub async fn next_event(&mut self) -> Option<ProducerEvent> {
        self.events_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ProducerEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Handle every queued event without waiting. Returns how many were
    /// applied.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.try_next_event() {
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one producer event. Returns `false` when it was ignored
    /// (stale epoch, or not meaningful in the current mode).
    pub fn handle_event(&mut self, event: ProducerEvent) -> bool {
        if event.epoch != self.epoch {
            tracing::trace!(epoch = event.epoch, current = self.epoch, "stale producer event");
            return false;
        }
        match (self.mode, event.kind) {
            (ConnectionMode::Live, EventKind::Frame { raw, arrival_ms }) => {
                match parse_frame(&raw, self.buffers.resource_id(), arrival_ms) {
                    Ok(reading) => {
                        self.store(reading);
                    }
                    Err(e) => {
                        self.dropped_frames += 1;
                        tracing::warn!(error = %e, frame = %raw, "dropping frame");
                    }
                }
                true
            }
            (ConnectionMode::Live, EventKind::TransportLost(e)) => {
                tracing::warn!(resource = %self.buffers.resource_id(), error = %e, "live transport lost");
                self.apply(ModeEvent::TransportLost);
                true
            }
            (ConnectionMode::Simulated, EventKind::Tick { now_ms }) => {
                let Some(generator) = self.generator.as_mut() else {
                    return false;
                };
                let readings =
                    generator.tick(self.buffers.enabled(), self.buffers.resource_id(), now_ms);
                for reading in readings {
                    self.store(reading);
                }
                true
            }
            _ => false,
        }
    }

    fn store(&mut self, reading: Reading) {
        let channel = reading.channel;
        match self.buffers.push(reading) {
            PushOutcome::Accepted { .. } => {}
            PushOutcome::ChannelDisabled => {
                tracing::trace!(channel = %channel, "reading for disabled channel ignored");
            }
            PushOutcome::ForeignResource => {
                tracing::debug!(channel = %channel, "reading for another resource ignored");
            }
        }
    }

    // ─── Views ──────────────────────────────────────────────────────

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Status text announced on every transition.
    pub fn status(&self) -> &'static str {
        self.mode.status_text()
    }

    /// Observe mode changes from another task.
    pub fn subscribe_mode(&self) -> watch::Receiver<ConnectionMode> {
        self.mode_tx.subscribe()
    }

    pub fn resource_id(&self) -> &ResourceId {
        self.buffers.resource_id()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn rate_window_ms(&self) -> u64 {
        self.rate_window_ms
    }

    pub fn kpi(&self, kind: ChannelKind) -> Kpi {
        self.buffers
            .channel(kind)
            .map_or(Kpi::NO_DATA, sima_iot_core::kpi)
    }

    /// Readings per minute over the configured window, as of now.
    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate_at(now_ms(), self.rate_window_ms)
    }

    pub fn arrival_rate_at(&self, now_ms: TimestampMs, window_ms: u64) -> f64 {
        sima_iot_core::arrival_rate(
            self.buffers.flat_log(),
            self.buffers.enabled(),
            now_ms,
            window_ms,
        )
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<&Reading> {
        self.buffers.recent(limit)
    }

    pub fn channel_values(&self, kind: ChannelKind) -> Vec<f64> {
        self.buffers
            .channel(kind)
            .map(|b| b.values())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(now_ms())
    }

    pub fn snapshot_at(&self, now_ms: TimestampMs) -> SessionSnapshot {
        let channels = ChannelKind::ALL
            .into_iter()
            .filter(|k| self.buffers.is_enabled(*k))
            .map(|k| {
                let kpi = self.kpi(k);
                ChannelSnapshot {
                    channel: k,
                    unit: k.meta().unit,
                    buffered: self.buffers.channel(k).map_or(0, |b| b.len()),
                    display: kpi.display(k),
                    kpi,
                }
            })
            .collect();
        SessionSnapshot {
            resource_id: self.buffers.resource_id().clone(),
            mode: self.mode,
            status: self.status(),
            channels,
            arrival_rate_per_min: self.arrival_rate_at(now_ms, self.rate_window_ms),
            flat_len: self.buffers.flat_len(),
            dropped_frames: self.dropped_frames,
        }
    }

    // ─── Export ─────────────────────────────────────────────────────

    pub fn export_csv(&self) -> Result<Vec<u8>, ExportError> {
        sima_iot_core::export_csv(self.buffers.flat_log())
    }

    /// Write `iot_<resource>_<millis>.csv` under `dir` and return its path.
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let bytes = self.export_csv()?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(self.buffers.resource_id(), now_ms()));
        std::fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), rows = self.buffers.flat_len(), "exported csv");
        Ok(path)
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.stop();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub resource_id: ResourceId,
    pub mode: ConnectionMode,
    pub status: &'static str,
    pub channels: Vec<ChannelSnapshot>,
    pub arrival_rate_per_min: f64,
    pub flat_len: usize,
    pub dropped_frames: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub channel: ChannelKind,
    pub unit: &'static str,
    pub buffered: usize,
    pub kpi: Kpi,
    pub display: [String; 4],
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sima_iot_source_stream::{ChannelConnector, FrameSender, TransportError};

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            // Ticks are injected by hand; keep the real ticker quiet.
            tick_interval_ms: 3_600_000,
            seed: Some(7),
            ..RuntimeConfig::default()
        }
    }

    async fn live_session() -> (Session<ChannelConnector>, FrameSender) {
        let (connector, sender) = ChannelConnector::new();
        let mut session = Session::new(connector, &test_config());
        assert_eq!(session.connect().await, ConnectionMode::Live);
        (session, sender)
    }

    async fn next_queued(session: &mut Session<ChannelConnector>) -> ProducerEvent {
        tokio::time::timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("event in time")
            .expect("event")
    }

    fn tick(session: &Session<ChannelConnector>, now_ms: TimestampMs) -> ProducerEvent {
        ProducerEvent {
            epoch: session.epoch(),
            kind: EventKind::Tick { now_ms },
        }
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let (connector, _sender) = ChannelConnector::new();
        let session = Session::new(connector, &test_config());
        assert_eq!(session.mode(), ConnectionMode::Disconnected);
        assert_eq!(session.status(), "Disconnected");
        assert!(session.kpi(ChannelKind::Temp).is_no_data());
    }

    #[tokio::test]
    async fn connect_failure_fails_over_immediately() {
        let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
        let mode = session.connect().await;
        assert_eq!(mode, ConnectionMode::Simulated);
        assert_eq!(session.status(), "Simulated");
        assert_eq!(*session.subscribe_mode().borrow(), ConnectionMode::Simulated);
    }

    /// Accepts the subscribe call and never answers it.
    struct StalledConnector;

    impl Connector for StalledConnector {
        async fn subscribe(
            &self,
            _resource_id: &ResourceId,
        ) -> Result<sima_iot_source_stream::Subscription, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_connect_times_out_into_simulation() {
        let config = RuntimeConfig {
            connect_timeout_ms: 50,
            ..test_config()
        };
        let mut session = Session::new(StalledConnector, &config);
        let mode = tokio::time::timeout(Duration::from_secs(5), session.connect())
            .await
            .expect("connect gave up in time");
        assert_eq!(mode, ConnectionMode::Simulated);
        assert_eq!(session.status(), "Simulated");
        assert_eq!(*session.subscribe_mode().borrow(), ConnectionMode::Simulated);
    }

    #[tokio::test]
    async fn live_frames_fill_buffers() {
        let (mut session, sender) = live_session().await;
        assert_eq!(session.status(), "Live");

        assert!(sender.frame(r#"{"ts":1000,"type":"temp","value":21.5}"#).await);
        assert!(sender.frame("2000,humid,44").await);
        assert!(sender.frame("garbage").await);
        for _ in 0..3 {
            let event = next_queued(&mut session).await;
            assert!(session.handle_event(event));
        }

        assert_eq!(session.kpi(ChannelKind::Temp).last, Some(21.5));
        assert_eq!(session.channel_values(ChannelKind::Humid), vec![44.0]);
        assert_eq!(session.buffers().flat_len(), 2);
        assert_eq!(session.dropped_frames(), 1);
    }

    #[tokio::test]
    async fn stale_frame_after_disconnect_is_ignored() {
        let (mut session, sender) = live_session().await;
        assert!(sender.frame("1000,temp,20").await);
        let event = next_queued(&mut session).await;
        let stale_epoch = event.epoch;
        assert!(session.handle_event(event));

        session.disconnect();
        assert_eq!(session.mode(), ConnectionMode::Disconnected);
        assert_eq!(session.status(), "Disconnected");

        // A frame already taken off a stopped handle.
        let late = ProducerEvent {
            epoch: stale_epoch,
            kind: EventKind::Frame {
                raw: "2000,temp,99".into(),
                arrival_ms: 2000,
            },
        };
        assert!(!session.handle_event(late));
        let _ = sender.try_frame("3000,temp,99");
        tokio::task::yield_now().await;
        session.drain_pending();

        assert_eq!(session.buffers().flat_len(), 1);
        assert_eq!(session.channel_values(ChannelKind::Temp), vec![20.0]);
    }

    #[tokio::test]
    async fn stale_handle_frames_do_not_leak_into_reconnect() {
        let (mut session, sender) = live_session().await;
        assert!(sender.frame("1000,temp,20").await);
        let queued = next_queued(&mut session).await;

        session.disconnect();
        // Reconnecting fails (channel already taken) and fails over.
        assert_eq!(session.connect().await, ConnectionMode::Simulated);
        assert!(!session.handle_event(queued));
        assert_eq!(session.buffers().flat_len(), 0);
    }

    #[tokio::test]
    async fn disconnect_keeps_buffers() {
        let (mut session, sender) = live_session().await;
        assert!(sender.frame("1000,temp,20").await);
        let event = next_queued(&mut session).await;
        session.handle_event(event);
        session.disconnect();
        assert_eq!(session.kpi(ChannelKind::Temp).last, Some(20.0));
    }

    #[tokio::test]
    async fn transport_loss_fails_over_once() {
        let (mut session, sender) = live_session().await;
        assert!(sender.frame("1000,temp,20").await);
        assert!(sender.drop_transport(TransportError::Closed).await);

        let frame = next_queued(&mut session).await;
        assert!(session.handle_event(frame));
        let lost = next_queued(&mut session).await;
        assert!(session.handle_event(lost));
        assert_eq!(session.mode(), ConnectionMode::Simulated);
        assert_eq!(session.status(), "Simulated");

        // A second loss report in Simulated mode changes nothing.
        let again = ProducerEvent {
            epoch: session.epoch(),
            kind: EventKind::TransportLost(TransportError::Closed),
        };
        assert!(!session.handle_event(again));
        assert_eq!(session.mode(), ConnectionMode::Simulated);

        // The simulator continues from the last live value.
        let t = tick(&session, 2000);
        assert!(session.handle_event(t));
        let temp = session.channel_values(ChannelKind::Temp);
        assert_eq!(temp.len(), 2);
        assert!((temp[1] - 20.0).abs() <= 1.0, "{temp:?}");
    }

    #[tokio::test]
    async fn simulated_ticks_are_reproducible() {
        async fn run() -> Vec<Reading> {
            let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
            session.connect().await;
            for i in 1..=30 {
                let t = tick(&session, i * 1000);
                assert!(session.handle_event(t));
            }
            session.buffers().flat_log().cloned().collect()
        }
        let a = run().await;
        let b = run().await;
        assert_eq!(a.len(), 90);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn ticks_ignored_when_live() {
        let (mut session, _sender) = live_session().await;
        let t = tick(&session, 1000);
        assert!(!session.handle_event(t));
        assert_eq!(session.buffers().flat_len(), 0);
    }

    #[tokio::test]
    async fn resource_switch_clears_and_disconnects() {
        let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
        session.connect().await;
        let t = tick(&session, 1000);
        session.handle_event(t);
        assert_eq!(session.buffers().flat_len(), 3);
        let old_epoch = session.epoch();

        assert!(session.select_resource(ResourceId::new("P-002")));
        assert_eq!(session.mode(), ConnectionMode::Disconnected);
        assert_eq!(session.resource_id(), &ResourceId::new("P-002"));
        assert_eq!(session.buffers().flat_len(), 0);
        assert!(session.kpi(ChannelKind::Temp).is_no_data());

        let stale = ProducerEvent {
            epoch: old_epoch,
            kind: EventKind::Tick { now_ms: 2000 },
        };
        assert!(!session.handle_event(stale));
        assert!(!session.select_resource(ResourceId::new("P-002")));
    }

    #[tokio::test]
    async fn disabled_channel_is_not_buffered() {
        let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
        session.set_channel_enabled(ChannelKind::Humid, false);
        session.set_channel_enabled(ChannelKind::Noise, true);
        session.connect().await;
        let t = tick(&session, 1000);
        session.handle_event(t);
        assert!(session.channel_values(ChannelKind::Humid).is_empty());
        assert_eq!(session.channel_values(ChannelKind::Noise).len(), 1);
        assert_eq!(session.buffers().flat_len(), 3);
    }

    #[tokio::test]
    async fn connect_while_connected_is_noop() {
        let (mut session, _sender) = live_session().await;
        let epoch = session.epoch();
        assert_eq!(session.connect().await, ConnectionMode::Live);
        assert_eq!(session.epoch(), epoch);
    }

    #[tokio::test]
    async fn snapshot_and_rate() {
        let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
        session.connect().await;
        for i in 1..=4 {
            let t = tick(&session, i * 10_000);
            session.handle_event(t);
        }
        // 4 ticks x 3 channels inside the last minute.
        assert_eq!(session.arrival_rate_at(40_000, 60_000), 12.0);

        let snap = session.snapshot_at(40_000);
        assert_eq!(snap.status, "Simulated");
        assert_eq!(snap.channels.len(), 3);
        assert_eq!(snap.flat_len, 12);
        assert_eq!(snap.channels[0].channel, ChannelKind::Temp);
        assert_eq!(snap.channels[0].buffered, 4);
        let json = serde_json::to_value(&snap).expect("json");
        assert_eq!(json["mode"], "simulated");
    }

    #[tokio::test]
    async fn export_writes_named_file() {
        let mut session = Session::new(ChannelConnector::failing("offline"), &test_config());
        session.connect().await;
        let t = tick(&session, 1_700_000_000_000);
        session.handle_event(t);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = session.export_to_dir(dir.path()).expect("export");
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("iot_P-001_") && name.ends_with(".csv"), "{name}");

        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(bytes, session.export_csv().expect("csv"));
        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        assert_eq!(rdr.records().count(), 3);
    }
}
