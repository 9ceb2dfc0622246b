//! exalink-transport: socket transports for exalink.
//!
//! - [`TcpTransport`] -- the persistent command channel to the playback
//!   server, implementing [`Transport`](exalink_core::Transport)
//! - [`TcpConnector`] -- dials fresh [`TcpTransport`]s for the session
//!   manager's reconnect path
//! - [`UdpTransport`] -- datagram receive path for the OSC status ingress

pub mod tcp;
pub mod udp;

pub use tcp::{TcpConnector, TcpTransport};
pub use udp::UdpTransport;
