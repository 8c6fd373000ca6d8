//! Error types for the monitoring core.

use thiserror::Error;

/// A frame that could not be decoded into a reading. Non-fatal: the frame is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty frame")]
    Empty,

    #[error("invalid structured frame: {0}")]
    Structured(String),

    #[error("invalid delimited frame: {0}")]
    Delimited(String),

    #[error("unknown channel type: {0}")]
    UnknownChannel(String),

    #[error("value is not a finite number: {0}")]
    InvalidValue(String),
}

/// Serialization or file-save failure during export. The caller may retry.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv writer flush failed: {0}")]
    Flush(String),

    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected buffer or session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("channel capacity must be at least 1")]
    ZeroChannelCapacity,

    #[error("flat log capacity ({flat}) must be at least the channel capacity ({channel})")]
    FlatCapacityTooSmall { flat: usize, channel: usize },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}
