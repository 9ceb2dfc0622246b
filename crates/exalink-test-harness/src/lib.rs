//! exalink-test-harness: test doubles for the gateway's device link.
//!
//! - [`MockTransport`] -- in-memory [`Transport`](exalink_core::Transport)
//!   with scripted request/reply pairs, for deterministic codec and
//!   session tests without a network
//! - [`ScriptedConnector`] -- a [`Connector`](exalink_core::Connector)
//!   that replays scripted connect outcomes and counts attempts, for
//!   retry/backoff tests
//! - [`MockDeviceServer`] -- a localhost TCP listener speaking the
//!   CR/CRLF line protocol, for end-to-end tests over a real socket

pub mod connector;
pub mod mock_device;
pub mod mock_transport;

pub use connector::ScriptedConnector;
pub use mock_device::MockDeviceServer;
pub use mock_transport::MockTransport;
