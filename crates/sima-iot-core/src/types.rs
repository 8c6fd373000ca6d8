use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

// ─── Resource ─────────────────────────────────────────────────────

/// Identifier of the monitored entity (project or site) a session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ─── Channel ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Temp,
    Humid,
    Light,
    Co2,
    Noise,
}

/// Static metadata for a channel kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMeta {
    pub unit: &'static str,
    /// Valid numeric range, inclusive.
    pub min: f64,
    pub max: f64,
    /// Decimal places used for display.
    pub precision: usize,
    /// Starting value for the failover generator when no history exists.
    pub seed_value: f64,
    /// Per-tick trend bias range `[low, high]` for the failover generator.
    pub trend: (f64, f64),
}

impl ChannelKind {
    pub const ALL: [Self; 5] = [Self::Temp, Self::Humid, Self::Light, Self::Co2, Self::Noise];

    /// Channels enabled when a session starts.
    pub const DEFAULT_ENABLED: [Self; 3] = [Self::Temp, Self::Humid, Self::Light];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temp => "temp",
            Self::Humid => "humid",
            Self::Light => "light",
            Self::Co2 => "co2",
            Self::Noise => "noise",
        }
    }

    pub fn meta(self) -> ChannelMeta {
        match self {
            Self::Temp => ChannelMeta {
                unit: "°C",
                min: 10.0,
                max: 50.0,
                precision: 1,
                seed_value: 30.0,
                trend: (-0.2, 0.4),
            },
            Self::Humid => ChannelMeta {
                unit: "%",
                min: 10.0,
                max: 100.0,
                precision: 0,
                seed_value: 40.0,
                trend: (-0.4, 0.2),
            },
            Self::Light => ChannelMeta {
                unit: "lx",
                min: 0.0,
                max: 2000.0,
                precision: 0,
                seed_value: 500.0,
                trend: (-10.0, 20.0),
            },
            Self::Co2 => ChannelMeta {
                unit: "ppm",
                min: 350.0,
                max: 2000.0,
                precision: 0,
                seed_value: 600.0,
                trend: (-5.0, 15.0),
            },
            Self::Noise => ChannelMeta {
                unit: "dB",
                min: 20.0,
                max: 100.0,
                precision: 0,
                seed_value: 55.0,
                trend: (-1.0, 2.0),
            },
        }
    }

    /// Render a value with this channel's precision and unit.
    ///
    /// Percent and degree units attach directly; others are space-separated.
    pub fn format_value(self, value: f64) -> String {
        let meta = self.meta();
        let sep = match self {
            Self::Temp | Self::Humid => "",
            _ => " ",
        };
        format!("{value:.prec$}{sep}{unit}", prec = meta.precision, unit = meta.unit)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temp" => Ok(Self::Temp),
            "humid" => Ok(Self::Humid),
            "light" => Ok(Self::Light),
            "co2" => Ok(Self::Co2),
            "noise" => Ok(Self::Noise),
            _ => Err(ParseError::UnknownChannel(s.to_string())),
        }
    }
}

// ─── Reading ──────────────────────────────────────────────────────

/// One timestamped sample. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp_ms: TimestampMs,
    pub channel: ChannelKind,
    pub resource_id: ResourceId,
    pub value: f64,
}

impl Reading {
    pub fn new(
        timestamp_ms: TimestampMs,
        channel: ChannelKind,
        resource_id: ResourceId,
        value: f64,
    ) -> Self {
        Self {
            timestamp_ms,
            channel,
            resource_id,
            value,
        }
    }
}

// ─── Connection Mode ──────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Disconnected,
    Live,
    Simulated,
}

impl ConnectionMode {
    /// Human-readable status announced on every transition.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Live => "Live",
            Self::Simulated => "Simulated",
        }
    }

    pub fn is_connected(self) -> bool {
        self != Self::Disconnected
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}

// ─── Tests ────────────────────────────────────────────────────────
