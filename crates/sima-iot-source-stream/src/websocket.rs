//! WebSocket live source.
//!
//! Connects to `<base>?pid=<resourceId>` and forwards every text frame as a
//! raw frame. Binary frames are accepted when they are valid UTF-8. A close
//! frame, read error, or end of stream terminates the subscription.

use futures_util::StreamExt;
use sima_iot_core::ResourceId;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::connector::{Connector, Subscription, SubscriptionFeed};
use crate::error::TransportError;

/// Query parameter carrying the resource id.
const RESOURCE_PARAM: &str = "pid";

#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: Url,
}

impl WsConnector {
    /// `base_url` must use the `ws` or `wss` scheme.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{base_url}: {e}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { base_url: url }),
            other => Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme {other:?} in {base_url}"
            ))),
        }
    }

    /// Endpoint for one resource. Any existing `pid` parameter is replaced.
    pub fn endpoint(&self, resource_id: &ResourceId) -> Url {
        let mut url = self.base_url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != RESOURCE_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (k, v) in &kept {
                query.append_pair(k, v);
            }
            query.append_pair(RESOURCE_PARAM, resource_id.as_str());
        }
        url
    }
}

impl Connector for WsConnector {
    async fn subscribe(&self, resource_id: &ResourceId) -> Result<Subscription, TransportError> {
        let url = self.endpoint(resource_id);
        tracing::info!(url = %url, "connecting to live stream");

        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::info!(resource = %resource_id, "live stream connected");

        let (feed, subscription) = Subscription::pair(resource_id.clone());
        tokio::spawn(read_frames(ws, feed));
        Ok(subscription)
    }
}

async fn read_frames(mut ws: WebSocketStream<MaybeTlsStream<TcpStream>>, feed: SubscriptionFeed) {
    loop {
        let next = tokio::select! {
            () = feed.cancelled() => None,
            message = ws.next() => Some(message),
        };
        let Some(message) = next else {
            let _ = ws.close(None).await;
            tracing::debug!("live stream reader cancelled");
            return;
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                if !feed.send_frame(text).await {
                    return;
                }
            }
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => {
                    if !feed.send_frame(text).await {
                        return;
                    }
                }
                Err(_) => tracing::debug!("dropping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::warn!("live stream closed");
                feed.lose(TransportError::Closed).await;
                return;
            }
            // Ping/Pong are answered by tungstenite.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "live stream error");
                feed.lose(TransportError::Stream(e.to_string())).await;
                return;
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_resource() {
        let c = WsConnector::new("ws://localhost:8080/api/iot/stream").expect("valid");
        let url = c.endpoint(&ResourceId::new("P-001"));
        assert_eq!(url.as_str(), "ws://localhost:8080/api/iot/stream?pid=P-001");
    }

    #[test]
    fn endpoint_replaces_existing_pid_and_encodes() {
        let c = WsConnector::new("wss://example.test/stream?token=abc&pid=old").expect("valid");
        let url = c.endpoint(&ResourceId::new("site 7/a"));
        assert_eq!(
            url.as_str(),
            "wss://example.test/stream?token=abc&pid=site+7%2Fa"
        );
    }

    #[test]
    fn rejects_non_websocket_scheme() {
        assert!(matches!(
            WsConnector::new("http://localhost/stream"),
            Err(TransportError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            WsConnector::new("not a url"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        // Reserve an ephemeral port, then release it so nothing listens there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("bind")
            .local_addr()
            .expect("local addr");
        let c = WsConnector::new(&format!("ws://{addr}/stream")).expect("valid");
        let err = c.subscribe(&ResourceId::new("P-001")).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
