//! UDP transport for the OSC status ingress.
//!
//! The playback server can push real-time status updates as OSC datagrams
//! over UDP. [`UdpTransport`] is the receive path for that ingress; unlike
//! [`super::TcpTransport`] it does **not** implement the
//! [`Transport`](exalink_core::Transport) trait, because UDP is
//! connectionless and datagram-based rather than stream-oriented.
//!
//! The send path exists so tests (and the mock device) can push packets
//! at an ingress bound to a loopback port.

use exalink_core::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Datagram socket wrapper with error mapping consistent with the rest of
/// the exalink transport layer.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// The local address the socket is bound to.
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local `host:port` address.
    ///
    /// Use port 0 to let the OS pick a free port (tests), or the
    /// configured OSC listen port in production.
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::warn!(addr = %addr, error = %e, "failed to bind UDP socket");
            Error::Io(e)
        })?;

        let local_addr = socket.local_addr().map_err(Error::Io)?;
        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// The local address this socket is bound to.
    ///
    /// Useful after binding to port 0 to discover the assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one datagram to the specified address.
    ///
    /// The whole slice is sent atomically; UDP does not guarantee
    /// delivery or ordering.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        tracing::trace!(
            local = %self.local_addr,
            remote = %addr,
            bytes = data.len(),
            "sending datagram"
        );

        self.socket.send_to(data, addr).await.map_err(Error::Io)?;
        Ok(())
    }

    /// Receive one datagram with timeout. Returns `(bytes_read, source)`.
    ///
    /// The buffer should be large enough for a whole datagram; excess
    /// bytes are silently discarded (standard UDP behavior). OSC status
    /// messages are well under 256 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no datagram arrives within `timeout`.
    pub async fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => {
                tracing::trace!(
                    local = %self.local_addr,
                    remote = %src,
                    bytes = n,
                    "received datagram"
                );
                Ok((n, src))
            }
            Ok(Err(e)) => {
                tracing::warn!(local = %self.local_addr, error = %e, "datagram receive failed");
                Err(Error::Io(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Receive one datagram with timeout, ignoring the source address.
    pub async fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let (n, _src) = self.recv_from(buf, timeout).await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_local_addr() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr();

        assert_eq!(addr.ip(), std::net::Ipv4Addr::LOCALHOST);
        assert_ne!(addr.port(), 0, "OS should assign a nonzero port");
    }

    #[tokio::test]
    async fn send_recv_loopback() {
        let sender = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let data = b"/exaplay/status/comp1";
        sender.send_to(data, receiver.local_addr()).await.unwrap();

        let mut buf = [0u8; 256];
        let n = receiver.recv(&mut buf, Duration::from_secs(2)).await.unwrap();

        assert_eq!(&buf[..n], data);
    }

    #[tokio::test]
    async fn recv_timeout() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let mut buf = [0u8; 256];
        let result = transport.recv_from(&mut buf, Duration::from_millis(50)).await;

        assert!(
            matches!(result, Err(Error::Timeout)),
            "expected Timeout, got: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn recv_from_returns_source() {
        let socket_a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let socket_b = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let data = b"probe";
        socket_a.send_to(data, socket_b.local_addr()).await.unwrap();

        let mut buf = [0u8; 256];
        let (n, src) = socket_b
            .recv_from(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(&buf[..n], data);
        assert_eq!(src, socket_a.local_addr());
    }

    #[tokio::test]
    async fn multiple_datagrams_in_order() {
        let sender = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let receiver = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let dest = receiver.local_addr();

        let messages: &[&[u8]] = &[b"first", b"second", b"third"];
        for msg in messages {
            sender.send_to(msg, dest).await.unwrap();
        }

        // Small delay to let all datagrams arrive on loopback.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut buf = [0u8; 256];
        for expected in messages {
            let n = receiver.recv(&mut buf, Duration::from_secs(2)).await.unwrap();
            assert_eq!(&buf[..n], *expected);
        }
    }
}
