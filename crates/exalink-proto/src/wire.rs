//! Line-protocol codec for the playback server's TCP command channel.
//!
//! Commands go out as UTF-8 text lines `verb[:subverb],composition[,param...]`
//! terminated with CR; replies come back as single lines terminated with
//! CRLF. Replies carry no request identifier, so the session manager keeps
//! exactly one command in flight and this codec decodes each reply against
//! the shape the command implies.
//!
//! All functions are pure -- they produce or consume byte vectors and
//! string slices without performing any I/O.

use exalink_core::error::{Error, Result};
use exalink_core::types::Command;

use crate::status;

/// The CR byte that terminates every outbound command line.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// The prefix the server uses for error replies.
pub const ERROR_PREFIX: &str = "ERR";

/// Upper bound on a sane reply line. Status replies are tens of bytes;
/// anything larger means the decoder has lost framing.
pub const MAX_REPLY_LINE: usize = 4096;

/// The reply shape implied by a command's verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A bare acknowledgement line (control and set commands).
    Ack,
    /// A 5-field CSV status payload (`get:status`).
    Status,
    /// A 0-100 integer (`get:vol`).
    Volume,
    /// A bare version string (`get:ver`).
    Version,
    /// An opaque line passed through verbatim (raw commands).
    Raw,
}

impl ReplyKind {
    /// The reply shape to expect for a given command.
    pub fn for_command(cmd: &Command) -> ReplyKind {
        match cmd {
            Command::GetStatus { .. } => ReplyKind::Status,
            Command::GetVolume { .. } => ReplyKind::Volume,
            Command::GetVersion => ReplyKind::Version,
            Command::Raw(_) => ReplyKind::Raw,
            _ => ReplyKind::Ack,
        }
    }
}

/// The typed result of one command/reply exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The server acknowledged a control or set command (typically `OK`).
    Ack(String),
    /// A normalized status snapshot.
    Status(exalink_core::Status),
    /// Current volume level, 0-100.
    Volume(u8),
    /// Server version string, e.g. `2.21.0.0`.
    Version(String),
    /// Verbatim reply to a raw command.
    Raw(String),
}

/// Result of attempting to extract one reply line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDecode {
    /// A complete line was extracted (terminator stripped).
    Frame {
        /// The reply line without its CRLF terminator.
        line: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },
    /// The buffer does not yet contain a complete line.
    Incomplete,
}

/// Encode a command into its wire form, CR-terminated.
///
/// Parameter validation happens here, before any I/O: a command that
/// fails encoding never reaches the session queue. Failures are
/// [`Error::InvalidCommand`].
pub fn encode(cmd: &Command) -> Result<Vec<u8>> {
    let line = match cmd {
        Command::Play { composition } => {
            validate_composition(composition)?;
            format!("play,{composition}")
        }
        Command::Pause { composition } => {
            validate_composition(composition)?;
            format!("pause,{composition}")
        }
        Command::Stop { composition } => {
            validate_composition(composition)?;
            format!("stop,{composition}")
        }
        Command::SetCueTime {
            composition,
            seconds,
        } => {
            validate_composition(composition)?;
            if !seconds.is_finite() || *seconds < 0.0 {
                return Err(Error::InvalidCommand(format!(
                    "cuetime {seconds} must be a finite non-negative number of seconds"
                )));
            }
            format!("set:cuetime,{composition},{seconds}")
        }
        Command::SetCue { composition, index } => {
            validate_composition(composition)?;
            if *index < 1 {
                return Err(Error::InvalidCommand(format!(
                    "cue index {index} must be at least 1"
                )));
            }
            format!("set:cue,{composition},{index}")
        }
        Command::SetVolume { composition, value } => {
            validate_composition(composition)?;
            if *value > 100 {
                return Err(Error::InvalidCommand(format!(
                    "volume {value} out of range 0-100"
                )));
            }
            format!("set:vol,{composition},{value}")
        }
        Command::GetVolume { composition } => {
            validate_composition(composition)?;
            format!("get:vol,{composition}")
        }
        Command::GetStatus { composition } => {
            validate_composition(composition)?;
            format!("get:status,{composition}")
        }
        Command::GetVersion => "get:ver".to_string(),
        Command::Raw(raw) => {
            if raw.is_empty() {
                return Err(Error::InvalidCommand("raw command is empty".into()));
            }
            if raw.contains(['\r', '\n']) {
                return Err(Error::InvalidCommand(
                    "raw command must not contain CR or LF".into(),
                ));
            }
            raw.clone()
        }
    };

    let mut bytes = line.into_bytes();
    bytes.push(COMMAND_TERMINATOR);
    Ok(bytes)
}

/// Extract one CRLF-terminated reply line from a byte buffer.
///
/// A bare LF terminator is tolerated. Returns [`FrameDecode::Incomplete`]
/// until a full line is buffered; non-UTF-8 line bytes are an
/// [`Error::Protocol`] carrying the raw payload.
pub fn decode_frame(buf: &[u8]) -> Result<FrameDecode> {
    let lf_pos = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None => return Ok(FrameDecode::Incomplete),
    };

    let consumed = lf_pos + 1;
    let mut body = &buf[..lf_pos];
    if body.last() == Some(&b'\r') {
        body = &body[..body.len() - 1];
    }

    match std::str::from_utf8(body) {
        Ok(line) => Ok(FrameDecode::Frame {
            line: line.to_string(),
            consumed,
        }),
        Err(_) => Err(Error::Protocol {
            message: "reply is not valid UTF-8".into(),
            raw: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}

/// Decode a framed reply line against the shape its command implies.
///
/// A reply starting with `ERR` is an [`Error::Protocol`] regardless of
/// shape -- the server rejected the command. Shape mismatches (wrong CSV
/// field count, non-numeric volume) are also protocol errors; neither is
/// ever retried by the session manager.
pub fn decode_reply(kind: ReplyKind, line: &str) -> Result<Reply> {
    if line.starts_with(ERROR_PREFIX) {
        return Err(Error::Protocol {
            message: "server returned error reply".into(),
            raw: line.to_string(),
        });
    }

    match kind {
        ReplyKind::Ack => Ok(Reply::Ack(line.to_string())),
        ReplyKind::Status => Ok(Reply::Status(status::map_csv(line)?)),
        ReplyKind::Volume => Ok(Reply::Volume(status::parse_volume(line)?)),
        ReplyKind::Version => Ok(Reply::Version(status::parse_version(line)?)),
        ReplyKind::Raw => Ok(Reply::Raw(line.to_string())),
    }
}

/// Parse a command line back into a [`Command`].
///
/// Inverse of [`encode`] for the structured verbs; raw commands are not
/// reconstructible and unknown verbs fail. Used by the mock device in the
/// test harness to interpret what a client sent.
pub fn decode_command(line: &str) -> Result<Command> {
    let fields: Vec<&str> = line.split(',').collect();
    let verb = fields[0];

    let arity = |n: usize| -> Result<()> {
        if fields.len() != n {
            return Err(Error::InvalidCommand(format!(
                "{verb} takes {} fields, got {}",
                n,
                fields.len()
            )));
        }
        Ok(())
    };
    let composition = |idx: usize| -> Result<String> {
        let name = fields[idx];
        validate_composition(name)?;
        Ok(name.to_string())
    };

    let cmd = match verb {
        "play" => {
            arity(2)?;
            Command::Play {
                composition: composition(1)?,
            }
        }
        "pause" => {
            arity(2)?;
            Command::Pause {
                composition: composition(1)?,
            }
        }
        "stop" => {
            arity(2)?;
            Command::Stop {
                composition: composition(1)?,
            }
        }
        "set:cuetime" => {
            arity(3)?;
            let seconds: f64 = fields[2].parse().map_err(|_| {
                Error::InvalidCommand(format!("cuetime {:?} is not a number", fields[2]))
            })?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(Error::InvalidCommand(format!(
                    "cuetime {seconds} must be a finite non-negative number of seconds"
                )));
            }
            Command::SetCueTime {
                composition: composition(1)?,
                seconds,
            }
        }
        "set:cue" => {
            arity(3)?;
            let index: u32 = fields[2].parse().map_err(|_| {
                Error::InvalidCommand(format!("cue index {:?} is not an integer", fields[2]))
            })?;
            if index < 1 {
                return Err(Error::InvalidCommand(format!(
                    "cue index {index} must be at least 1"
                )));
            }
            Command::SetCue {
                composition: composition(1)?,
                index,
            }
        }
        "set:vol" => {
            arity(3)?;
            let value: u8 = fields[2]
                .parse()
                .ok()
                .filter(|v| *v <= 100)
                .ok_or_else(|| {
                    Error::InvalidCommand(format!("volume {:?} out of range 0-100", fields[2]))
                })?;
            Command::SetVolume {
                composition: composition(1)?,
                value,
            }
        }
        "get:vol" => {
            arity(2)?;
            Command::GetVolume {
                composition: composition(1)?,
            }
        }
        "get:status" => {
            arity(2)?;
            Command::GetStatus {
                composition: composition(1)?,
            }
        }
        "get:ver" => {
            arity(1)?;
            Command::GetVersion
        }
        other => {
            return Err(Error::InvalidCommand(format!("unknown verb {other:?}")));
        }
    };

    Ok(cmd)
}

/// Reject composition names that would corrupt the line format.
fn validate_composition(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidCommand("composition name is empty".into()));
    }
    if name.contains([',', '\r', '\n']) {
        return Err(Error::InvalidCommand(format!(
            "composition name {name:?} must not contain commas or line breaks"
        )));
    }
    Ok(())
}
