//! Mock playback server for protocol-level testing over a real socket.
//!
//! [`MockDeviceServer`] is a lightweight TCP listener pre-loaded with
//! scripted line-protocol exchanges, enabling end-to-end testing of the
//! session manager and `TcpConnector` without real hardware.
//!
//! # Example
//!
//! ```
//! use exalink_test_harness::MockDeviceServer;
//!
//! # async fn example() -> exalink_core::Result<()> {
//! let mut server = MockDeviceServer::new().await?;
//! server.expect_line("get:ver", "2.21.0.0");
//!
//! let ready = server.start();
//! // ... connect a TcpConnector to server.addr() once ready resolves ...
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use exalink_core::error::{Error, Result};

/// One scripted request/reply exchange.
#[derive(Debug, Clone)]
struct Exchange {
    /// The exact bytes the client is expected to send.
    request: Vec<u8>,
    /// The bytes written back when the request matches.
    reply: Vec<u8>,
}

/// A scripted mock of the playback server's TCP command port.
///
/// The server listens on a random localhost port. Once
/// [`start`](MockDeviceServer::start) is called it accepts a single
/// connection and processes the scripted exchanges in order: read the
/// expected request bytes, verify them, write the paired reply. A
/// mismatch terminates the server task with a descriptive error, which
/// [`wait`](MockDeviceServer::wait) surfaces to the test.
pub struct MockDeviceServer {
    /// The bound listener, consumed by `start()`.
    listener: Option<TcpListener>,
    /// The address the server is listening on.
    addr: String,
    /// Ordered script of exchanges.
    exchanges: VecDeque<Exchange>,
    /// Handle to the server task once started.
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockDeviceServer {
    /// Bind a new mock server on a random localhost port.
    ///
    /// The listener is held open from this point, so a client may dial as
    /// soon as [`start`](MockDeviceServer::start) signals readiness.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock device server: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();

        Ok(Self {
            listener: Some(listener),
            addr,
            exchanges: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected exchange as raw bytes.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.exchanges.push_back(Exchange {
            request: request.to_vec(),
            reply: reply.to_vec(),
        });
    }

    /// Add an expected exchange in line form: the request gets the
    /// protocol's CR terminator appended, the reply gets CRLF.
    pub fn expect_line(&mut self, request: &str, reply: &str) {
        self.expect(
            format!("{request}\r").as_bytes(),
            format!("{reply}\r\n").as_bytes(),
        );
    }

    /// The `host:port` address the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Start the server task. The returned channel resolves once the
    /// listener is accepting, so tests cannot race the first dial.
    pub fn start(&mut self) -> oneshot::Receiver<()> {
        let listener = self
            .listener
            .take()
            .expect("mock device server already started");
        let exchanges: Vec<Exchange> = self.exchanges.drain(..).collect();
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let _ = ready_tx.send(());

            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;

            for (i, exchange) in exchanges.iter().enumerate() {
                let mut buf = vec![0u8; exchange.request.len()];
                let mut total_read = 0;

                // Read exactly the expected number of bytes.
                while total_read < exchange.request.len() {
                    let n = stream
                        .read(&mut buf[total_read..])
                        .await
                        .map_err(|e| format!("exchange {}: read error: {}", i, e))?;
                    if n == 0 {
                        return Err(format!(
                            "exchange {}: client disconnected after {} bytes (expected {})",
                            i,
                            total_read,
                            exchange.request.len()
                        ));
                    }
                    total_read += n;
                }

                if buf != exchange.request {
                    return Err(format!(
                        "exchange {}: request mismatch: expected {:?}, got {:?}",
                        i,
                        String::from_utf8_lossy(&exchange.request),
                        String::from_utf8_lossy(&buf)
                    ));
                }

                stream
                    .write_all(&exchange.reply)
                    .await
                    .map_err(|e| format!("exchange {}: write error: {}", i, e))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("exchange {}: flush error: {}", i, e))?;
            }

            Ok(())
        });

        self.server_handle = Some(handle);
        ready_rx
    }

    /// Wait for the server task and surface any script violations.
    ///
    /// Call after the client has finished to verify every exchange ran.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}
