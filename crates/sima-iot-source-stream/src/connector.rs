//! Connector contract: `subscribe(resource_id) -> stream of raw frames`.

use std::future::Future;

use sima_iot_core::ResourceId;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::TransportError;

/// Frames buffered between a transport reader and its consumer.
pub const SUBSCRIPTION_QUEUE_DEPTH: usize = 256;

/// One item delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Undecoded frame payload.
    Frame(String),
    /// Transport failed or ended. Always the last item of a subscription.
    Lost(TransportError),
}

/// Live source of raw frames for one resource.
///
/// Implementations never retry: a connect failure is returned from
/// `subscribe`, and a later drop is delivered once as [`StreamItem::Lost`].
pub trait Connector: Send + Sync + 'static {
    fn subscribe(
        &self,
        resource_id: &ResourceId,
    ) -> impl Future<Output = Result<Subscription, TransportError>> + Send;
}

// ─── Subscription ───────────────────────────────────────────────────

/// Receiving half of an active subscription.
///
/// Closing or dropping it cancels the transport reader feeding it.
#[derive(Debug)]
pub struct Subscription {
    resource_id: ResourceId,
    rx: mpsc::Receiver<StreamItem>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        resource_id: ResourceId,
        rx: mpsc::Receiver<StreamItem>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resource_id,
            rx,
            cancel,
        }
    }

    /// Create a subscription together with the feed a reader task writes to.
    pub fn pair(resource_id: ResourceId) -> (SubscriptionFeed, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let feed = SubscriptionFeed {
            tx,
            cancel: cancel.clone(),
        };
        (feed, Self::new(resource_id, rx, cancel))
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Next item, or `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Cancel the reader and refuse further items. Idempotent.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── SubscriptionFeed ───────────────────────────────────────────────

/// Sending half used by transport reader tasks.
#[derive(Debug, Clone)]
pub struct SubscriptionFeed {
    tx: mpsc::Sender<StreamItem>,
    cancel: CancellationToken,
}

impl SubscriptionFeed {
    /// Deliver a frame. Returns `false` when the subscription is gone and
    /// the reader should stop.
    pub async fn send_frame(&self, raw: String) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(StreamItem::Frame(raw)).await.is_ok()
    }

    /// Report the terminal transport error.
    pub async fn lose(&self, err: TransportError) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.tx.send(StreamItem::Lost(err)).await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
