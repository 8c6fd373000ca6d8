//! CSV export of the flat log.
//!
//! Output is UTF-8, one header line followed by one line per reading, each
//! terminated by `\n`. Every data field is quoted and embedded quotes are
//! doubled. The same input always produces the same bytes.

use chrono::{DateTime, SecondsFormat};

use crate::error::ExportError;
use crate::types::{Reading, ResourceId, TimestampMs};

pub const CSV_HEADER: [&str; 5] = ["ts", "iso", "resourceId", "type", "value"];

/// Serialize readings in the given order.
pub fn export_csv<'a>(log: impl IntoIterator<Item = &'a Reading>) -> Result<Vec<u8>, ExportError> {
    let mut header = CSV_HEADER.join(",").into_bytes();
    header.push(b'\n');

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(header);

    for r in log {
        writer.write_record([
            r.timestamp_ms.to_string(),
            iso_timestamp(r.timestamp_ms),
            r.resource_id.to_string(),
            r.channel.to_string(),
            r.value.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))
}

/// RFC 3339 with millisecond precision and a `Z` suffix. Out-of-range
/// timestamps render as an empty field.
pub fn iso_timestamp(ts: TimestampMs) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// `iot_<resource>_<millis>.csv`
pub fn export_file_name(resource_id: &ResourceId, now_ms: TimestampMs) -> String {
    let safe: String = resource_id
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("iot_{safe}_{now_ms}.csv")
}

// ─── Tests ──────────────────────────────────────────────────────────
