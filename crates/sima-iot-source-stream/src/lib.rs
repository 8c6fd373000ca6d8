//! sima-iot-source-stream: live push-stream IO boundary.
//! Subscribes to a per-resource frame stream and hands raw frames to the
//! session controller. No decoding and no retry: a failed or dropped
//! transport is reported once and the subscription ends.

pub mod channel;
pub mod connector;
pub mod error;
pub mod replay;
pub mod websocket;

pub use channel::{ChannelConnector, FrameSender};
pub use connector::{Connector, StreamItem, Subscription};
pub use error::TransportError;
pub use replay::ReplayConnector;
pub use websocket::WsConnector;
