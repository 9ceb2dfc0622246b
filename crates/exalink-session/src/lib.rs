//! exalink-session: the device-communication core of the gateway.
//!
//! Four cooperating actors, each a tokio task owning its resources
//! exclusively and communicating only through channels:
//!
//! - [`Session`] -- owns the TCP command channel; serializes commands
//!   strictly FIFO with one request in flight, applies per-request
//!   timeouts and bounded exponential-backoff retry, and reconnects
//!   transparently through a [`Connector`](exalink_core::Connector)
//! - [`StatusBus`] -- fans status events out to any number of streaming
//!   subscribers with drop-oldest backpressure per subscriber
//! - [`OscIngress`] -- optional UDP listener turning OSC status pushes
//!   into bus events
//! - [`Poller`] -- issues periodic `get:status` queries when push
//!   updates are not enabled, feeding the same bus
//!
//! The OSC ingress and the poller are interchangeable producers behind
//! the one [`StatusEvent`](exalink_core::StatusEvent) shape; consumers
//! cannot tell which protocol a status came from.

pub mod backoff;
pub mod bus;
pub mod ingress;
pub mod poller;
pub mod session;

pub use backoff::BackoffPolicy;
pub use bus::{StatusBus, Subscription, DEFAULT_BUS_CAPACITY};
pub use ingress::{IngressConfig, IngressStats, OscIngress};
pub use poller::{Poller, PollerConfig};
pub use session::{Session, SessionConfig};
