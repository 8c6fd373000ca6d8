//! File replay source.
//!
//! Plays back a recorded capture, one frame per line, at a fixed pace.
//! Blank lines and lines starting with `#` are skipped. The subscription
//! ends with [`TransportError::Ended`] after the last line.

use std::path::PathBuf;
use std::time::Duration;

use sima_iot_core::ResourceId;

use crate::connector::{Connector, Subscription, SubscriptionFeed};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct ReplayConnector {
    path: PathBuf,
    interval: Duration,
}

impl ReplayConnector {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }
}

impl Connector for ReplayConnector {
    async fn subscribe(&self, resource_id: &ResourceId) -> Result<Subscription, TransportError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.path.display())))?;

        let frames: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();

        tracing::info!(
            path = %self.path.display(),
            resource = %resource_id,
            frames = frames.len(),
            "replaying capture"
        );

        let (feed, subscription) = Subscription::pair(resource_id.clone());
        tokio::spawn(replay_frames(frames, self.interval, feed));
        Ok(subscription)
    }
}

async fn replay_frames(frames: Vec<String>, interval: Duration, feed: SubscriptionFeed) {
    for (i, raw) in frames.into_iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::select! {
                () = feed.cancelled() => return,
                () = tokio::time::sleep(interval) => {}
            }
        }
        if !feed.send_frame(raw).await {
            return;
        }
    }
    feed.lose(TransportError::Ended).await;
}

// ─── Tests ──────────────────────────────────────────────────────────
