//! # exalink -- ExaPlay Gateway Core
//!
//! `exalink` is the device-communication core of a protocol gateway for
//! ExaPlay media servers. It speaks the server's line-based TCP command
//! protocol and its optional OSC (UDP) status broadcast, and exposes a
//! stable async API to whatever front-end sits on top (HTTP routes, an
//! SSE streamer, a CLI): submit a command, read the connection state,
//! subscribe to live status events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use exalink::{Command, Session, SessionConfig, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> exalink::Result<()> {
//!     let connector = TcpConnector::new("192.168.1.174:7000");
//!     let session = Session::spawn(connector, SessionConfig::default());
//!
//!     println!("server version: {}", session.version().await?);
//!
//!     session
//!         .submit(Command::Play {
//!             composition: "comp1".into(),
//!         })
//!         .await?;
//!
//!     let status = session.status("comp1").await?;
//!     println!("comp1 is {} at {:.2}s", status.state, status.time_seconds);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                         |
//! |------------------------|-------------------------------------------------|
//! | `exalink-core`         | Types ([`Command`], [`Status`]), traits, errors |
//! | `exalink-transport`    | TCP command channel, UDP datagram receive       |
//! | `exalink-proto`        | Wire codec, CSV status mapper, OSC codec        |
//! | `exalink-session`      | Session actor, status bus, ingress, poller      |
//! | `exalink-test-harness` | Mock transports and a scripted mock device      |
//! | **`exalink`**          | This facade crate -- re-exports everything      |
//!
//! ## Command channel
//!
//! [`Session`] owns the single TCP connection in a dedicated task and
//! serializes commands strictly FIFO with one request in flight -- the
//! device protocol has no request identifiers, so ordering is the only
//! thing keeping replies matched to commands. Transport failures retry
//! on a fresh connection with capped exponential backoff; `ERR` replies
//! and malformed payloads surface immediately as typed errors.
//!
//! ## Live status
//!
//! Status updates reach subscribers through the [`StatusBus`], fed by
//! either producer:
//!
//! - [`OscIngress`] when the server pushes OSC status datagrams
//! - [`Poller`] issuing periodic `get:status` queries otherwise
//!
//! Both produce the same [`StatusEvent`] shape; consumers cannot tell
//! the origin protocol apart. Publishing never blocks: a subscriber that
//! falls behind loses the oldest events and sees a gap in sequence
//! numbers, never an error.
//!
//! ```no_run
//! use exalink::{IngressConfig, OscIngress, StatusBus};
//! use std::sync::Arc;
//!
//! # async fn example() -> exalink::Result<()> {
//! let bus = Arc::new(StatusBus::default());
//! let ingress = OscIngress::bind(IngressConfig::default(), Arc::clone(&bus)).await?;
//!
//! let mut events = bus.subscribe();
//! while let Some(event) = events.recv().await {
//!     println!("{} #{}: {}", event.composition, event.seq, event.status.state);
//! }
//! # ingress.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub use exalink_core::*;

pub use exalink_session::{
    BackoffPolicy, IngressConfig, IngressStats, OscIngress, Poller, PollerConfig, Session,
    SessionConfig, StatusBus, Subscription, DEFAULT_BUS_CAPACITY,
};
pub use exalink_transport::{TcpConnector, TcpTransport, UdpTransport};

/// Pure protocol codecs: the wire format, the CSV status mapper, and the
/// OSC codec. Front-ends normally only need [`proto::Reply`].
pub mod proto {
    pub use exalink_proto::*;
}
