//! Transport error types.

use thiserror::Error;

/// The live subscription could not be established or was lost.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream closed by peer")]
    Closed,

    #[error("stream ended")]
    Ended,
}
