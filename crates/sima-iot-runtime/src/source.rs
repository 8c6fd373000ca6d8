//! Connector selection from configuration.

use sima_iot_core::ResourceId;
use sima_iot_source_stream::{Connector, ReplayConnector, Subscription, TransportError, WsConnector};

use crate::config::RuntimeConfig;

/// The connector the monitor runs against.
#[derive(Debug)]
pub enum StreamSource {
    Live(WsConnector),
    Replay(ReplayConnector),
    /// No stream configured: every connect fails over to simulation.
    Offline,
}

impl StreamSource {
    /// A replay file takes precedence over the stream URL.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, TransportError> {
        if let Some(path) = &config.replay_file {
            return Ok(Self::Replay(ReplayConnector::new(
                path.clone(),
                config.replay_interval(),
            )));
        }
        match &config.stream_url {
            Some(url) => Ok(Self::Live(WsConnector::new(url)?)),
            None => Ok(Self::Offline),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Live(_) => "websocket",
            Self::Replay(_) => "replay",
            Self::Offline => "offline",
        }
    }
}

impl Connector for StreamSource {
    async fn subscribe(&self, resource_id: &ResourceId) -> Result<Subscription, TransportError> {
        match self {
            Self::Live(c) => c.subscribe(resource_id).await,
            Self::Replay(c) => c.subscribe(resource_id).await,
            Self::Offline => Err(TransportError::Connect("no stream configured".into())),
        }
    }
}
