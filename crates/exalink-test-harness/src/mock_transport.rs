//! Mock transport for deterministic testing of the session machinery.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/reply pairs, so command encoding, reply framing, and the
//! session's retry behavior can be tested without a socket.
//!
//! # Example
//!
//! ```
//! use exalink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the session sends this command line, return this reply line.
//! mock.expect_line("get:ver", "2.21.0.0");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use exalink_core::error::{Error, Result};
use exalink_core::transport::Transport;

/// A pre-loaded request/reply pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return from subsequent `receive()` calls.
    reply: Vec<u8>,
}

/// A mock [`Transport`] with scripted exchanges.
///
/// Expectations are consumed in order. `send()` matches the sent bytes
/// against the next expectation; the paired reply is then drained by
/// `receive()` calls. An empty reply makes `receive()` report
/// [`Error::Timeout`], which is how tests simulate a silent server.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/reply pairs.
    expectations: VecDeque<Expectation>,
    /// Reply bytes pending for `receive()`.
    pending_reply: Option<Vec<u8>>,
    /// How many bytes of the pending reply have been read so far.
    reply_cursor: usize,
    /// Whether the transport reports itself connected.
    connected: bool,
    /// Every byte sequence passed to `send()`.
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_reply: None,
            reply_cursor: 0,
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected request/reply pair as raw bytes.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        self.expectations.push_back(Expectation {
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

    /// Add an expected command whose reply never arrives.
    pub fn expect_silence(&mut self, request: &str) {
        self.expect(format!("{request}\r").as_bytes(), b"");
    }

    /// All data sent through this transport, one entry per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state. When `false`, `send()` and `receive()`
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        match self.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(Error::Protocol {
                        message: format!(
                            "unexpected send: expected {:?}",
                            String::from_utf8_lossy(&expectation.request)
                        ),
                        raw: String::from_utf8_lossy(data).into_owned(),
                    });
                }
                self.pending_reply = Some(expectation.reply);
                self.reply_cursor = 0;
                Ok(())
            }
            None => Err(Error::Protocol {
                message: "no more expectations in mock transport".into(),
                raw: String::from_utf8_lossy(data).into_owned(),
            }),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        match self.pending_reply {
            Some(ref reply) => {
                let remaining = &reply[self.reply_cursor..];
                if remaining.is_empty() {
                    self.pending_reply = None;
                    self.reply_cursor = 0;
                    return Err(Error::Timeout);
                }
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                self.reply_cursor += n;
                if self.reply_cursor >= reply.len() {
                    self.pending_reply = None;
                    self.reply_cursor = 0;
                }
                Ok(n)
            }
            None => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_exchange() {
        let mut mock = MockTransport::new();
        mock.expect_line("get:ver", "2.21.0.0");

        mock.send(b"get:ver\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"2.21.0.0\r\n");

        assert_eq!(mock.sent_data(), &[b"get:ver\r".to_vec()]);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn reply_spans_small_reads() {
        let mut mock = MockTransport::new();
        mock.expect_line("get:status,comp1", "1,15.65,939,2,300.0");

        mock.send(b"get:status,comp1\r").await.unwrap();

        let mut collected = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            match mock.receive(&mut buf, Duration::from_millis(10)).await {
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(Error::Timeout) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(collected, b"1,15.65,939,2,300.0\r\n");
    }

    #[tokio::test]
    async fn mismatched_send_is_error() {
        let mut mock = MockTransport::new();
        mock.expect_line("play,comp1", "OK");

        let result = mock.send(b"stop,comp1\r").await;
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn silence_reports_timeout() {
        let mut mock = MockTransport::new();
        mock.expect_silence("play,comp1");

        mock.send(b"play,comp1\r").await.unwrap();

        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn disconnected_transport_refuses_io() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);

        assert!(matches!(
            mock.send(b"play,comp1\r").await,
            Err(Error::NotConnected)
        ));

        let mut buf = [0u8; 8];
        assert!(matches!(
            mock.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_disconnects() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());
        mock.close().await.unwrap();
        assert!(!mock.is_connected());
    }
}
