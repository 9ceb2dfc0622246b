//! exalink-core: Core traits, types, and error definitions for exalink.
//!
//! This crate defines the transport-agnostic abstractions shared by every
//! exalink crate. Gateway front-ends (HTTP routing, SSE delivery) depend on
//! these types without pulling in the session machinery or any socket code.
//!
//! # Key types
//!
//! - [`Command`] -- an outbound request to the playback server
//! - [`Status`] -- canonical playback state for one composition
//! - [`StatusEvent`] -- a sequenced status update on the fan-out bus
//! - [`Transport`] / [`Connector`] -- byte-level communication seam
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use exalink_core::*`.
pub use error::{Error, Result};
pub use events::StatusEvent;
pub use transport::{Connector, Transport};
pub use types::{Command, ConnectionState, PlaybackState, Status};
