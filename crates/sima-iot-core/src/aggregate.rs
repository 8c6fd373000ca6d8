//! Rolling summary statistics over buffered readings.
//!
//! Both entry points are pure reads. Display formatting is channel
//! metadata ([`ChannelKind::format_value`]), not aggregation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::buffer::ChannelBuffer;
use crate::types::{ChannelKind, Reading, TimestampMs};

/// Default arrival-rate window: one minute.
pub const DEFAULT_RATE_WINDOW_MS: u64 = 60_000;

const MS_PER_MINUTE: f64 = 60_000.0;

// ─── KPI ────────────────────────────────────────────────────────────

/// Last/average/min/max over a channel buffer.
///
/// Every field is `None` when the buffer is empty. Zero is a valid reading,
/// so absence is never encoded as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Kpi {
    pub last: Option<f64>,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Kpi {
    pub const NO_DATA: Self = Self {
        last: None,
        average: None,
        min: None,
        max: None,
    };

    pub fn is_no_data(&self) -> bool {
        self.last.is_none()
    }

    /// Render the four fields for display, using `—` for missing data.
    pub fn display(&self, kind: ChannelKind) -> [String; 4] {
        let fmt = |v: Option<f64>| v.map_or_else(|| "—".to_string(), |v| kind.format_value(v));
        [
            fmt(self.last),
            fmt(self.average),
            fmt(self.min),
            fmt(self.max),
        ]
    }
}

/// Compute the KPI for one channel in a single pass.
pub fn kpi(buffer: &ChannelBuffer) -> Kpi {
    let mut iter = buffer.iter();
    let Some(first) = iter.next() else {
        return Kpi::NO_DATA;
    };

    let mut sum = first.value;
    let mut min = first.value;
    let mut max = first.value;
    let mut last = first.value;
    let mut count = 1usize;

    for r in iter {
        sum += r.value;
        min = min.min(r.value);
        max = max.max(r.value);
        last = r.value;
        count += 1;
    }

    let average = sum / count as f64;

    Kpi {
        last: Some(last),
        average: Some(average),
        min: Some(min),
        max: Some(max),
    }
}

// ─── Arrival rate ───────────────────────────────────────────────────

/// Readings per minute with `timestamp >= now - window_ms`, counting only
/// enabled channels.
///
/// A zero window yields `0.0`.
pub fn arrival_rate<'a>(
    log: impl IntoIterator<Item = &'a Reading>,
    enabled: &BTreeSet<ChannelKind>,
    now_ms: TimestampMs,
    window_ms: u64,
) -> f64 {
    if window_ms == 0 {
        return 0.0;
    }
    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    let cutoff = now_ms.saturating_sub(window);

    let count = log
        .into_iter()
        .filter(|r| r.timestamp_ms >= cutoff && enabled.contains(&r.channel))
        .count();

    count as f64 * MS_PER_MINUTE / window_ms as f64
}

// ─── Tests ──────────────────────────────────────────────────────────
