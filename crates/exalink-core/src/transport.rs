//! Transport traits for server communication.
//!
//! [`Transport`] abstracts over the byte-level link to the playback
//! server. The real implementation is the TCP transport in
//! `exalink-transport`; tests use the mock from `exalink-test-harness`.
//!
//! [`Connector`] is the reconnection seam: the session manager discards a
//! failed transport and dials a fresh one through its connector, so the
//! retry machinery can be tested without a network by scripting connect
//! outcomes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the playback server.
///
/// Implementations handle connection state and error mapping at the
/// socket layer. Framing (CR-terminated commands, CRLF-terminated
/// replies) is handled by the session manager on top of this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the server.
    ///
    /// Implementations block until all bytes have been handed to the
    /// underlying socket and flushed.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the server into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`
    /// for data; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if none arrives within the deadline, and
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost)
    /// when the peer closes the stream.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After `close()`, subsequent `send()` and `receive()` calls return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Factory for [`Transport`] instances.
///
/// The session manager owns exactly one live transport at a time but must
/// replace it transparently after a drop, so it holds a connector rather
/// than a transport. Each call dials a fresh connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection to the server.
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}

#[async_trait]
impl<C> Connector for std::sync::Arc<C>
where
    C: Connector + ?Sized,
{
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        (**self).connect().await
    }
}
