//! sima-iot-core: pure data model and algorithms for the live sensor monitor.
//! Bounded per-channel history, rolling KPIs, frame decoding, deterministic
//! failover generation, connection-mode transitions, and CSV export.
//! No async, no network IO.

pub mod aggregate;
pub mod buffer;
pub mod error;
pub mod export;
pub mod frame;
pub mod mode;
pub mod simulate;
pub mod types;

pub use aggregate::{Kpi, arrival_rate, kpi};
pub use buffer::{BufferConfig, BufferManager, ChannelBuffer, PushOutcome};
pub use error::{ConfigError, ExportError, ParseError};
pub use export::{CSV_HEADER, export_csv, export_file_name};
pub use frame::parse_frame;
pub use mode::{ModeEvent, ModeTransition, transition_mode};
pub use simulate::Generator;
pub use types::{ChannelKind, ChannelMeta, ConnectionMode, Reading, ResourceId, TimestampMs};
