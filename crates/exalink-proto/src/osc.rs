//! OSC 1.0 datagram codec for the push-status ingress.
//!
//! The playback server can broadcast status over UDP as OSC messages at
//! `/{prefix}/status/{composition}` (full five-argument snapshots) plus
//! `/{prefix}/cuetime/{composition}` and `/{prefix}/cueframe/{composition}`
//! (single-argument position updates). This module is a pure parser and
//! encoder for the subset of OSC those messages use -- no I/O, operating
//! on raw byte slices, with argument types `i`, `h`, `f`, `d`, and `s`.
//!
//! Bundles are not supported: the server emits plain messages only, and
//! anything else is dropped by the ingress.

use exalink_core::error::{Error, Result};
use exalink_core::types::{PlaybackState, Status};

/// One decoded OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    /// `i` -- 32-bit big-endian signed integer.
    Int(i32),
    /// `h` -- 64-bit big-endian signed integer.
    Long(i64),
    /// `f` -- 32-bit big-endian IEEE 754 float.
    Float(f32),
    /// `d` -- 64-bit big-endian IEEE 754 float.
    Double(f64),
    /// `s` -- null-terminated string padded to a 4-byte boundary.
    Str(String),
}

impl OscArg {
    /// Interpret this argument as an integer.
    ///
    /// Floats with a zero fractional part are accepted; senders disagree
    /// about whether counters are `i` or `f`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OscArg::Int(v) => Some(*v as i64),
            OscArg::Long(v) => Some(*v),
            OscArg::Float(v) => float_to_i64(*v as f64),
            OscArg::Double(v) => float_to_i64(*v),
            OscArg::Str(_) => None,
        }
    }

    /// Interpret this argument as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OscArg::Int(v) => Some(*v as f64),
            OscArg::Long(v) => Some(*v as f64),
            OscArg::Float(v) => Some(*v as f64),
            OscArg::Double(v) => Some(*v),
            OscArg::Str(_) => None,
        }
    }
}

fn float_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// A decoded OSC message: address pattern plus arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    /// The address pattern, e.g. `/exaplay/status/comp1`.
    pub address: String,
    /// Decoded arguments in wire order.
    pub args: Vec<OscArg>,
}

/// Parse one OSC message from a raw UDP datagram.
///
/// Fails with [`Error::Protocol`] on bundles, truncated payloads,
/// malformed strings, and unsupported type tags. The ingress counts and
/// drops such packets without surfacing them further.
pub fn parse_packet(data: &[u8]) -> Result<OscMessage> {
    let mut offset = 0;

    let address = read_padded_str(data, &mut offset)?;
    if address == "#bundle" {
        return Err(protocol_err("OSC bundles are not supported", data));
    }
    if !address.starts_with('/') {
        return Err(protocol_err("OSC address must start with '/'", data));
    }
    let address = address.to_string();

    // A message with no type tag string carries no arguments.
    if offset >= data.len() {
        return Ok(OscMessage {
            address,
            args: Vec::new(),
        });
    }

    let tags = read_padded_str(data, &mut offset)?;
    let tags = tags
        .strip_prefix(',')
        .ok_or_else(|| protocol_err("OSC type tag string must start with ','", data))?
        .to_string();

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscArg::Int(i32::from_be_bytes(take4(data, &mut offset)?)),
            'h' => OscArg::Long(i64::from_be_bytes(take8(data, &mut offset)?)),
            'f' => OscArg::Float(f32::from_be_bytes(take4(data, &mut offset)?)),
            'd' => OscArg::Double(f64::from_be_bytes(take8(data, &mut offset)?)),
            's' => OscArg::Str(read_padded_str(data, &mut offset)?.to_string()),
            other => {
                return Err(protocol_err(
                    &format!("unsupported OSC type tag {other:?}"),
                    data,
                ));
            }
        };
        args.push(arg);
    }

    Ok(OscMessage { address, args })
}

/// Encode an OSC message into datagram bytes.
///
/// Symmetric with [`parse_packet`]; used by tests and the mock device to
/// push status packets at an ingress.
pub fn encode_message(msg: &OscMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_padded_str(&mut out, &msg.address);

    let mut tags = String::with_capacity(msg.args.len() + 1);
    tags.push(',');
    for arg in &msg.args {
        tags.push(match arg {
            OscArg::Int(_) => 'i',
            OscArg::Long(_) => 'h',
            OscArg::Float(_) => 'f',
            OscArg::Double(_) => 'd',
            OscArg::Str(_) => 's',
        });
    }
    write_padded_str(&mut out, &tags);

    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Str(s) => write_padded_str(&mut out, s),
        }
    }

    out
}

/// Map a decoded OSC message into a `(composition, Status)` pair.
///
/// Addresses must match `/{prefix}/{kind}/{composition}`:
///
/// - `status` -- args `[state, time, frame, clipIndex, duration]`, mapped
///   with the same fail-closed rules as the CSV mapper
/// - `cuetime` -- arg `[seconds]`, mapped to a playing status at that time
/// - `cueframe` -- arg `[frame]`, mapped to a playing status at that frame
///
/// Any other address (wrong prefix, wrong depth, unknown kind) returns
/// `Ok(None)`: not our message, dropped and counted by the ingress.
pub fn map_message(prefix: &str, msg: &OscMessage) -> Result<Option<(String, Status)>> {
    let parts: Vec<&str> = msg.address.split('/').collect();
    // Leading '/' yields an empty first component.
    if parts.len() != 4 || !parts[0].is_empty() || parts[1] != prefix || parts[3].is_empty() {
        return Ok(None);
    }
    let composition = parts[3].to_string();

    let status = match parts[2] {
        "status" => map_status_args(msg)?,
        "cuetime" => {
            let seconds = single_arg(msg)?
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| arg_malformed("time", msg, 0))?;
            let mut status = Status::zeroed(PlaybackState::Playing);
            status.time_seconds = seconds;
            status
        }
        "cueframe" => {
            let frame = single_arg(msg)?
                .as_i64()
                .filter(|v| *v >= 0)
                .ok_or_else(|| arg_malformed("frame", msg, 0))?;
            let mut status = Status::zeroed(PlaybackState::Playing);
            status.frame = frame as u64;
            status
        }
        _ => return Ok(None),
    };

    Ok(Some((composition, status)))
}

/// Map the five status arguments into a [`Status`].
fn map_status_args(msg: &OscMessage) -> Result<Status> {
    if msg.args.len() != 5 {
        return Err(Error::Protocol {
            message: format!("status message requires 5 arguments, got {}", msg.args.len()),
            raw: msg.address.clone(),
        });
    }

    let state_code = msg.args[0]
        .as_i64()
        .ok_or_else(|| arg_malformed("state", msg, 0))?;
    let state = PlaybackState::from_code(state_code)?;

    let time_seconds = msg.args[1]
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| arg_malformed("time", msg, 1))?;

    let frame = msg.args[2]
        .as_i64()
        .filter(|v| *v >= 0)
        .ok_or_else(|| arg_malformed("frame", msg, 2))? as u64;

    let clip_index = msg.args[3]
        .as_i64()
        .filter(|v| *v >= -1 && *v <= i32::MAX as i64)
        .ok_or_else(|| arg_malformed("clipIndex", msg, 3))? as i32;

    let duration_seconds = msg.args[4]
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| arg_malformed("duration", msg, 4))?;

    Ok(Status {
        state,
        time_seconds,
        frame,
        clip_index,
        duration_seconds,
    })
}

fn single_arg(msg: &OscMessage) -> Result<&OscArg> {
    msg.args.first().ok_or_else(|| Error::Protocol {
        message: "message carries no arguments".into(),
        raw: msg.address.clone(),
    })
}

fn arg_malformed(field: &'static str, msg: &OscMessage, idx: usize) -> Error {
    Error::MalformedStatusField {
        field,
        value: format!("{:?}", msg.args.get(idx)),
    }
}

fn protocol_err(message: &str, data: &[u8]) -> Error {
    Error::Protocol {
        message: message.to_string(),
        raw: format!("{:02X?}", &data[..data.len().min(64)]),
    }
}

/// Read a null-terminated string padded to a 4-byte boundary, advancing
/// `offset` past the padding.
fn read_padded_str<'a>(data: &'a [u8], offset: &mut usize) -> Result<&'a str> {
    let rest = &data[*offset..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| protocol_err("unterminated OSC string", data))?;

    let s = std::str::from_utf8(&rest[..nul])
        .map_err(|_| protocol_err("OSC string is not valid UTF-8", data))?;

    // Length including the null, rounded up to a multiple of 4.
    let advance = (nul + 1).div_ceil(4) * 4;
    if *offset + advance > data.len() {
        return Err(protocol_err("truncated OSC string padding", data));
    }
    *offset += advance;

    Ok(s)
}

/// Append a string with its null terminator and 4-byte padding.
fn write_padded_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    let padded = (s.len() + 1).div_ceil(4) * 4;
    out.resize(out.len() + (padded - s.len()), 0);
}

fn take4(data: &[u8], offset: &mut usize) -> Result<[u8; 4]> {
    let end = *offset + 4;
    if end > data.len() {
        return Err(protocol_err("truncated OSC argument", data));
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(bytes)
}

fn take8(data: &[u8], offset: &mut usize) -> Result<[u8; 8]> {
    let end = *offset + 8;
    if end > data.len() {
        return Err(protocol_err("truncated OSC argument", data));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(bytes)
}
