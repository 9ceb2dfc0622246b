//! exalink-proto: pure codecs for the playback server protocols.
//!
//! Three protocol surfaces, all implemented as pure functions over byte
//! slices and string slices with no I/O:
//!
//! - [`wire`] -- the line-based TCP command protocol (encode commands,
//!   frame and decode replies)
//! - [`status`] -- CSV status payload normalization into
//!   [`Status`](exalink_core::Status)
//! - [`osc`] -- OSC datagram parsing and status mapping for the optional
//!   UDP push path
//!
//! Everything here is deterministic and referentially transparent; this
//! crate is the bulk of the unit-test surface.

pub mod osc;
pub mod status;
pub mod wire;

pub use osc::{OscArg, OscMessage};
pub use wire::{FrameDecode, Reply, ReplyKind};
