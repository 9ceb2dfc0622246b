//! TCP transport for the playback server command channel.
//!
//! The server speaks a line-based text protocol on a single TCP port:
//! commands go out as CR-terminated ASCII lines, replies come back
//! CRLF-terminated. This module provides the raw byte channel --
//! [`TcpTransport`] -- and the dialer the session manager uses to
//! replace a dropped connection, [`TcpConnector`].
//!
//! # Example
//!
//! ```no_run
//! use exalink_transport::TcpTransport;
//! use exalink_core::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> exalink_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.174:7000").await?;
//! transport.send(b"get:ver\r").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use exalink_core::error::{Error, Result};
use exalink_core::transport::{Connector, Transport};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout (5 seconds).
///
/// Generous enough for a LAN media server that is busy rendering, short
/// enough that an unreachable host fails a submit promptly.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for the playback server command channel.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout). After
/// [`close`](Transport::close), all operations return
/// [`Error::NotConnected`].
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()`.
    stream: Option<TcpStream>,
    /// The address string for logging.
    addr: String,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint with a specified timeout.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "connecting to playback server"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::warn!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, addr)
            })?;

        // Commands are tiny and latency-sensitive; never let Nagle batch them.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "failed to set TCP_NODELAY");
        }

        tracing::debug!(addr = %addr, "TCP connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an already-connected `TcpStream` (e.g. accepted in a test).
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// The address this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, bytes = data.len(), data = ?data, "sending");

        stream.write_all(data).await.map_err(map_io_error)?;
        stream.flush().await.map_err(map_io_error)?;

        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                // 0 bytes read: the server closed its end.
                tracing::warn!(addr = %self.addr, "server closed connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, bytes = n, data = ?&buf[..n], "received");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::warn!(addr = %self.addr, error = %e, "receive failed");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "receive timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "closing TCP connection");

            if let Err(e) = stream.flush().await {
                tracing::warn!(addr = %self.addr, error = %e, "flush before close failed");
            }
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "TCP shutdown failed");
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Dials fresh [`TcpTransport`]s to a fixed endpoint.
///
/// The session manager holds one of these and calls
/// [`connect`](Connector::connect) whenever it needs to replace a dropped
/// connection.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector for a `host:port` endpoint with the default
    /// connect timeout.
    pub fn new(addr: impl Into<String>) -> Self {
        TcpConnector {
            addr: addr.into(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the per-dial connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint this connector dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect_with_timeout(&self.addr, self.timeout).await?;
        Ok(Box::new(transport))
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", addr))
        }
        _ => Error::Io(e),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
