//! In-process connector fed through a [`FrameSender`].
//!
//! Used by tests and by embedders that already own a frame source. A
//! connector hands out exactly one subscription.

use std::sync::{Mutex, PoisonError};

use sima_iot_core::ResourceId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connector::{Connector, SUBSCRIPTION_QUEUE_DEPTH, StreamItem, Subscription};
use crate::error::TransportError;

#[derive(Debug)]
pub struct ChannelConnector {
    pending: Mutex<Option<mpsc::Receiver<StreamItem>>>,
    fail_with: Option<String>,
}

impl ChannelConnector {
    pub fn new() -> (Self, FrameSender) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_QUEUE_DEPTH);
        let connector = Self {
            pending: Mutex::new(Some(rx)),
            fail_with: None,
        };
        (connector, FrameSender { tx })
    }

    /// A connector whose every `subscribe` fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            pending: Mutex::new(None),
            fail_with: Some(reason.into()),
        }
    }
}

impl Connector for ChannelConnector {
    async fn subscribe(&self, resource_id: &ResourceId) -> Result<Subscription, TransportError> {
        if let Some(reason) = &self.fail_with {
            return Err(TransportError::Connect(reason.clone()));
        }
        let rx = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| TransportError::Connect("channel already subscribed".into()))?;
        tracing::debug!(resource = %resource_id, "channel connector subscribed");
        Ok(Subscription::new(
            resource_id.clone(),
            rx,
            CancellationToken::new(),
        ))
    }
}

/// Producer side of a [`ChannelConnector`].
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<StreamItem>,
}

impl FrameSender {
    /// Returns `false` once the subscription is closed or dropped.
    pub async fn frame(&self, raw: impl Into<String>) -> bool {
        self.tx.send(StreamItem::Frame(raw.into())).await.is_ok()
    }

    pub fn try_frame(&self, raw: impl Into<String>) -> bool {
        self.tx.try_send(StreamItem::Frame(raw.into())).is_ok()
    }

    /// Simulate a transport drop.
    pub async fn drop_transport(&self, err: TransportError) -> bool {
        self.tx.send(StreamItem::Lost(err)).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
