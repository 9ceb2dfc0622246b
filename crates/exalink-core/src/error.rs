//! Error types for exalink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Caller errors, protocol-layer errors,
//! and transport-layer errors are all captured here; only the session
//! manager applies retry policy, and only to the transport-class variants.

/// The error type for all exalink operations.
///
/// Variants cover the full range of failure modes encountered when
/// talking to a playback server over an unreliable LAN link: parameter
/// validation, malformed replies, timeouts, and connection loss.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command parameter is out of its declared range, or a field would
    /// corrupt the wire format. Raised before any I/O and never retried.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The server sent a reply of an unexpected shape. The raw payload is
    /// carried for diagnostics. Never retried -- resending the command
    /// will not fix a malformed reply.
    #[error("protocol error: {message} (raw: {raw:?})")]
    Protocol {
        /// What was wrong with the reply.
        message: String,
        /// The offending payload as received.
        raw: String,
    },

    /// A status payload carried a playback state code outside {0, 1, 2}.
    /// The mapper fails closed rather than guessing a state.
    #[error("unknown playback state code: {0}")]
    UnknownStateCode(i64),

    /// A status field failed numeric parsing or range validation.
    /// The event is dropped, never coerced to a default.
    #[error("malformed status field {field}: {value:?}")]
    MalformedStatusField {
        /// Which of the five status fields was malformed.
        field: &'static str,
        /// The field value as received.
        value: String,
    },

    /// A transport-level error (TCP socket, UDP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for a reply from the server.
    #[error("timeout waiting for reply")]
    Timeout,

    /// No connection to the server has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the server was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The retry budget is exhausted. Carries the last underlying
    /// transport error; the caller may retry the whole submit.
    #[error("device unreachable after {attempts} attempts: {last}")]
    DeviceUnreachable {
        /// How many attempts were made before giving up.
        attempts: u32,
        /// The transport error observed on the final attempt.
        last: Box<Error>,
    },

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is transport-class and therefore eligible for
    /// the session manager's retry policy. Caller and protocol errors
    /// are never retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Timeout
                | Error::NotConnected
                | Error::ConnectionLost
                | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
