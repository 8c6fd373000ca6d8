//! Raw frame decoding: structured JSON first, delimited `ts,type,value`
//! as the fallback. Both paths yield the same `Result<Reading, ParseError>`.

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::{ChannelKind, Reading, ResourceId, TimestampMs};

/// Structured frame: `{"ts"?: number, "type": string, "value": number | string}`.
#[derive(Debug, Deserialize)]
struct StructuredFrame {
    #[serde(default)]
    ts: Option<f64>,
    #[serde(rename = "type")]
    kind: String,
    value: serde_json::Value,
}

/// Decode one frame into a reading for `resource_id`.
///
/// A missing, null, zero or unparsable timestamp falls back to `arrival_ms`.
pub fn parse_frame(
    raw: &str,
    resource_id: &ResourceId,
    arrival_ms: TimestampMs,
) -> Result<Reading, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    match parse_structured(raw, resource_id, arrival_ms) {
        Ok(reading) => Ok(reading),
        Err(structured_err) => match parse_delimited(raw, resource_id, arrival_ms) {
            Ok(reading) => Ok(reading),
            // Report the error of the format the frame most likely intended.
            Err(_) if raw.starts_with('{') => Err(structured_err),
            Err(delimited_err) => Err(delimited_err),
        },
    }
}

fn parse_structured(
    raw: &str,
    resource_id: &ResourceId,
    arrival_ms: TimestampMs,
) -> Result<Reading, ParseError> {
    let frame: StructuredFrame =
        serde_json::from_str(raw).map_err(|e| ParseError::Structured(e.to_string()))?;

    let channel: ChannelKind = frame.kind.parse()?;
    let value = match &frame.value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .ok_or_else(|| ParseError::InvalidValue(frame.value.to_string()))?;

    let timestamp_ms = frame
        .ts
        .and_then(timestamp_from_f64)
        .unwrap_or(arrival_ms);

    Ok(Reading::new(
        timestamp_ms,
        channel,
        resource_id.clone(),
        value,
    ))
}

fn parse_delimited(
    raw: &str,
    resource_id: &ResourceId,
    arrival_ms: TimestampMs,
) -> Result<Reading, ParseError> {
    let mut parts = raw.split(',');
    let (Some(ts), Some(kind), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ParseError::Delimited(format!(
            "expected ts,type,value but got {raw:?}"
        )));
    };

    let channel: ChannelKind = kind.parse()?;
    let value = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidValue(value.trim().to_string()))?;

    let timestamp_ms = ts
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(timestamp_from_f64)
        .unwrap_or(arrival_ms);

    Ok(Reading::new(
        timestamp_ms,
        channel,
        resource_id.clone(),
        value,
    ))
}

/// Positive finite milliseconds only; anything else means "use arrival time".
fn timestamp_from_f64(ts: f64) -> Option<TimestampMs> {
    if ts.is_finite() && ts >= 1.0 && ts < i64::MAX as f64 {
        Some(ts as TimestampMs)
    } else {
        None
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
