//! Canonical data model for the gateway.
//!
//! [`Command`] is the outbound request shape; [`Status`] is the canonical
//! playback state produced by the status mappers. Both are plain data --
//! wire encoding and validation live in `exalink-proto`.

use crate::error::{Error, Result};

/// Playback state of a composition, mapped from the server's numeric codes.
///
/// The server reports `0 = stopped`, `1 = playing`, `2 = paused`. Any other
/// code fails closed as [`Error::UnknownStateCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Playback stopped, position reset.
    Stopped,
    /// Actively playing.
    Playing,
    /// Paused at the current position.
    Paused,
}

impl PlaybackState {
    /// Map a numeric state code to a [`PlaybackState`].
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(PlaybackState::Stopped),
            1 => Ok(PlaybackState::Playing),
            2 => Ok(PlaybackState::Paused),
            other => Err(Error::UnknownStateCode(other)),
        }
    }

    /// The numeric code the server uses for this state.
    pub fn code(&self) -> u8 {
        match self {
            PlaybackState::Stopped => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Canonical playback status for one composition.
///
/// Produced by the CSV mapper (poll path) and the OSC mapper (push path).
/// Two producers, one shape: consumers can never tell which protocol a
/// status originated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Status {
    /// Current playback state.
    pub state: PlaybackState,
    /// Playhead position in seconds. Never negative.
    pub time_seconds: f64,
    /// Playhead position in frames.
    pub frame: u64,
    /// Active clip index: `-1` when not applicable, otherwise the cue or
    /// clip number (1-based for cuelists, 0-based cues occur on timelines).
    pub clip_index: i32,
    /// Total composition duration in seconds. Never negative.
    pub duration_seconds: f64,
}

impl Status {
    /// A stopped status at position zero with unknown duration.
    ///
    /// Used as the base for partial OSC updates (cuetime/cueframe) that
    /// carry only a single field.
    pub fn zeroed(state: PlaybackState) -> Self {
        Status {
            state,
            time_seconds: 0.0,
            frame: 0,
            clip_index: -1,
            duration_seconds: 0.0,
        }
    }
}

/// An outbound request to the playback server.
///
/// Construction is infallible; parameter validation (volume range, cue
/// index, time sign) happens in the wire encoder before any I/O so a bad
/// command never reaches the session queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start playback of a composition (`play,comp`).
    Play {
        /// Target composition name.
        composition: String,
    },
    /// Pause playback (`pause,comp`).
    Pause {
        /// Target composition name.
        composition: String,
    },
    /// Stop playback and reset the position (`stop,comp`).
    Stop {
        /// Target composition name.
        composition: String,
    },
    /// Seek a timeline composition to a time (`set:cuetime,comp,seconds`).
    SetCueTime {
        /// Target composition name.
        composition: String,
        /// Seek target in seconds. Must be finite and non-negative.
        seconds: f64,
    },
    /// Jump to a cue or clip (`set:cue,comp,index`).
    SetCue {
        /// Target composition name.
        composition: String,
        /// Cue/clip index, 1-based. Must be at least 1.
        index: u32,
    },
    /// Set composition volume (`set:vol,comp,value`).
    SetVolume {
        /// Target composition name.
        composition: String,
        /// Volume level, 0-100.
        value: u8,
    },
    /// Query composition volume (`get:vol,comp`).
    GetVolume {
        /// Target composition name.
        composition: String,
    },
    /// Query composition status (`get:status,comp`).
    GetStatus {
        /// Target composition name.
        composition: String,
    },
    /// Query the server version (`get:ver`). Takes no composition.
    GetVersion,
    /// An opaque command line passed through verbatim (admin/debug use).
    /// Must not contain CR or LF.
    Raw(String),
}

impl Command {
    /// The composition this command targets, if any.
    ///
    /// `get:ver` has no target, and a raw command's target is opaque.
    pub fn composition(&self) -> Option<&str> {
        match self {
            Command::Play { composition }
            | Command::Pause { composition }
            | Command::Stop { composition }
            | Command::SetCueTime { composition, .. }
            | Command::SetCue { composition, .. }
            | Command::SetVolume { composition, .. }
            | Command::GetVolume { composition }
            | Command::GetStatus { composition } => Some(composition),
            Command::GetVersion | Command::Raw(_) => None,
        }
    }

    /// The command verb as it appears on the wire.
    pub fn verb(&self) -> &str {
        match self {
            Command::Play { .. } => "play",
            Command::Pause { .. } => "pause",
            Command::Stop { .. } => "stop",
            Command::SetCueTime { .. } => "set:cuetime",
            Command::SetCue { .. } => "set:cue",
            Command::SetVolume { .. } => "set:vol",
            Command::GetVolume { .. } => "get:vol",
            Command::GetStatus { .. } => "get:status",
            Command::GetVersion => "get:ver",
            Command::Raw(_) => "raw",
        }
    }
}

/// Connection state of the session manager's TCP link.
///
/// Mutated only by the session actor; health and readiness probes read
/// it through the session handle as a lock-free snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no attempt in progress. Terminal after the retry
    /// budget is exhausted, until the next submit re-initiates dialing.
    Disconnected,
    /// A TCP connection attempt is in progress.
    Connecting,
    /// The command channel is established.
    Connected,
    /// A failure was observed; waiting out the backoff delay before the
    /// next connection attempt.
    BackingOff,
}

impl ConnectionState {
    /// Encode for storage in an atomic cell.
    pub fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::BackingOff => 3,
        }
    }

    /// Decode from an atomic cell. Unknown values map to `Disconnected`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::BackingOff,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::BackingOff => "backing-off",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_state_from_code() {
        assert_eq!(PlaybackState::from_code(0).unwrap(), PlaybackState::Stopped);
        assert_eq!(PlaybackState::from_code(1).unwrap(), PlaybackState::Playing);
        assert_eq!(PlaybackState::from_code(2).unwrap(), PlaybackState::Paused);
    }

    #[test]
    fn playback_state_unknown_code_fails_closed() {
        for code in [-1, 3, 7, 255] {
            match PlaybackState::from_code(code) {
                Err(Error::UnknownStateCode(c)) => assert_eq!(c, code),
                other => panic!("expected UnknownStateCode, got {other:?}"),
            }
        }
    }

    #[test]
    fn playback_state_round_trips_code() {
        for state in [
            PlaybackState::Stopped,
            PlaybackState::Playing,
            PlaybackState::Paused,
        ] {
            assert_eq!(
                PlaybackState::from_code(state.code() as i64).unwrap(),
                state
            );
        }
    }

    #[test]
    fn playback_state_display() {
        assert_eq!(PlaybackState::Stopped.to_string(), "stopped");
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
        assert_eq!(PlaybackState::Paused.to_string(), "paused");
    }

    #[test]
    fn command_composition() {
        let cmd = Command::Play {
            composition: "comp1".into(),
        };
        assert_eq!(cmd.composition(), Some("comp1"));
        assert_eq!(Command::GetVersion.composition(), None);
        assert_eq!(Command::Raw("get:status,comp1".into()).composition(), None);
    }

    #[test]
    fn command_verbs() {
        assert_eq!(
            Command::SetCueTime {
                composition: "c".into(),
                seconds: 1.0,
            }
            .verb(),
            "set:cuetime"
        );
        assert_eq!(Command::GetVersion.verb(), "get:ver");
    }

    #[test]
    fn connection_state_atomic_round_trip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::BackingOff,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
        // Out-of-range cells decode to the safe default.
        assert_eq!(ConnectionState::from_u8(99), ConnectionState::Disconnected);
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::BackingOff.to_string(), "backing-off");
    }

    #[test]
    fn status_zeroed() {
        let s = Status::zeroed(PlaybackState::Playing);
        assert_eq!(s.state, PlaybackState::Playing);
        assert_eq!(s.time_seconds, 0.0);
        assert_eq!(s.frame, 0);
        assert_eq!(s.clip_index, -1);
        assert_eq!(s.duration_seconds, 0.0);
    }
}
