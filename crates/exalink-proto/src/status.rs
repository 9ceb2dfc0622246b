//! Status payload normalization.
//!
//! The server reports composition status as five comma-separated fields:
//! `state,time,frame,clipIndex,duration` with state codes
//! `0=stopped, 1=playing, 2=paused`. This module maps that payload (and
//! the volume/version reply formats) into the canonical types, failing
//! closed on anything it does not recognize -- a malformed status is
//! dropped upstream, never coerced to a default.
//!
//! Numeric parsing uses `str::parse`, which is locale-independent by
//! construction.

use exalink_core::error::{Error, Result};
use exalink_core::types::{PlaybackState, Status};

/// Map a 5-field CSV status payload into a [`Status`].
///
/// Field order: `state,time,frame,clipIndex,duration`. Whitespace around
/// fields is tolerated. Failures:
///
/// - wrong field count -- [`Error::Protocol`] with the raw payload
/// - state code outside {0, 1, 2} -- [`Error::UnknownStateCode`]
/// - unparsable or out-of-range field -- [`Error::MalformedStatusField`]
///   naming the field
pub fn map_csv(raw: &str) -> Result<Status> {
    let fields: Vec<&str> = raw.trim().split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(Error::Protocol {
            message: format!("expected 5 CSV fields, got {}", fields.len()),
            raw: raw.to_string(),
        });
    }

    let state_code: i64 = fields[0].parse().map_err(|_| malformed("state", fields[0]))?;
    let state = PlaybackState::from_code(state_code)?;

    let time_seconds = parse_seconds("time", fields[1])?;

    let frame: u64 = fields[2].parse().map_err(|_| malformed("frame", fields[2]))?;

    let clip_index: i32 = fields[3]
        .parse()
        .ok()
        .filter(|idx| *idx >= -1)
        .ok_or_else(|| malformed("clipIndex", fields[3]))?;

    let duration_seconds = parse_seconds("duration", fields[4])?;

    Ok(Status {
        state,
        time_seconds,
        frame,
        clip_index,
        duration_seconds,
    })
}

/// Parse a volume reply into a 0-100 level.
///
/// Tolerates a `label:` prefix (`Volume: 60`), which some server builds
/// emit.
pub fn parse_volume(raw: &str) -> Result<u8> {
    let mut value = raw.trim();
    if let Some(pos) = value.rfind(':') {
        value = value[pos + 1..].trim();
    }

    value
        .parse::<i64>()
        .ok()
        .filter(|v| (0..=100).contains(v))
        .map(|v| v as u8)
        .ok_or_else(|| Error::Protocol {
            message: "volume reply is not an integer in 0-100".into(),
            raw: raw.to_string(),
        })
}

/// Parse a version reply into a bare version string.
///
/// Strips a leading `Version:` or `ver:` label (case-insensitive), which
/// some server builds emit. An empty reply is a protocol error.
pub fn parse_version(raw: &str) -> Result<String> {
    let mut version = raw.trim();

    let lower = version.to_ascii_lowercase();
    if lower.starts_with("version:") {
        version = version["version:".len()..].trim();
    } else if lower.starts_with("ver:") {
        version = version["ver:".len()..].trim();
    }

    if version.is_empty() {
        return Err(Error::Protocol {
            message: "empty version reply".into(),
            raw: raw.to_string(),
        });
    }

    Ok(version.to_string())
}

/// Parse a non-negative, finite seconds field.
fn parse_seconds(field: &'static str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| malformed(field, value))
}

fn malformed(field: &'static str, value: &str) -> Error {
    Error::MalformedStatusField {
        field,
        value: value.to_string(),
    }
}
