//! OSC status ingress: UDP listener feeding the status bus.
//!
//! When push updates are enabled on the playback server, it broadcasts
//! OSC datagrams at `/{prefix}/status/{composition}` (plus cuetime and
//! cueframe position updates). The ingress decodes them, maps them to
//! canonical statuses, and publishes to the bus.
//!
//! The loop never fails loudly on noisy network input: malformed
//! packets, unmatched addresses, and unmappable payloads are counted in
//! [`IngressStats`] and dropped at debug level. Nothing on this path can
//! block or error a request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use exalink_core::error::{Error, Result};
use exalink_proto::osc;
use exalink_transport::UdpTransport;

use crate::bus::StatusBus;

/// How long one receive waits before looping to re-check cancellation.
const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer size. OSC status messages are well under 256 bytes;
/// this leaves room for senders that batch padding generously.
const MAX_DATAGRAM: usize = 2048;

/// Configuration for the OSC ingress.
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// `host:port` to bind the UDP listener on. Port 0 picks a free port.
    pub bind_addr: String,
    /// Address prefix filter: only `/{prefix}/...` messages are mapped.
    pub prefix: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        IngressConfig {
            bind_addr: "0.0.0.0:8000".to_string(),
            prefix: "exaplay".to_string(),
        }
    }
}

/// Counters for the ingress loop, readable while it runs.
#[derive(Debug, Default)]
pub struct IngressStats {
    received: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl IngressStats {
    /// Datagrams received, decodable or not.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    /// Status events published to the bus.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Datagrams dropped: undecodable, unmatched address, or unmappable.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Handle to the running ingress task.
pub struct OscIngress {
    local_addr: SocketAddr,
    stats: Arc<IngressStats>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl OscIngress {
    /// Bind the UDP listener and spawn the ingress loop.
    ///
    /// The ingress is optional by construction: a gateway that does not
    /// enable push status simply never calls this.
    pub async fn bind(config: IngressConfig, bus: Arc<StatusBus>) -> Result<Self> {
        let socket = UdpTransport::bind(&config.bind_addr).await?;
        let local_addr = socket.local_addr();
        let stats = Arc::new(IngressStats::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(ingress_loop(
            socket,
            config.prefix.clone(),
            bus,
            Arc::clone(&stats),
            cancel.clone(),
        ));

        info!(addr = %local_addr, prefix = %config.prefix, "OSC ingress listening");

        Ok(OscIngress {
            local_addr,
            stats,
            cancel,
            task,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Live counters for this ingress.
    pub fn stats(&self) -> Arc<IngressStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the ingress loop and release the socket.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// The ingress loop. Runs as a spawned tokio task.
async fn ingress_loop(
    socket: UdpTransport,
    prefix: String,
    bus: Arc<StatusBus>,
    stats: Arc<IngressStats>,
    cancel: CancellationToken,
) {
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("OSC ingress cancelled");
                break;
            }

            result = socket.recv_from(&mut buf, RECV_TIMEOUT) => {
                let (n, src) = match result {
                    Ok(pair) => pair,
                    Err(Error::Timeout) => continue,
                    Err(e) => {
                        warn!(error = %e, "OSC receive failed");
                        continue;
                    }
                };
                stats.received.fetch_add(1, Ordering::SeqCst);

                let msg = match osc::parse_packet(&buf[..n]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        stats.dropped.fetch_add(1, Ordering::SeqCst);
                        debug!(remote = %src, error = %e, "dropping undecodable OSC packet");
                        continue;
                    }
                };

                match osc::map_message(&prefix, &msg) {
                    Ok(Some((composition, status))) => {
                        bus.publish(&composition, status);
                        stats.published.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(None) => {
                        stats.dropped.fetch_add(1, Ordering::SeqCst);
                        debug!(address = %msg.address, "dropping OSC message outside the status namespace");
                    }
                    Err(e) => {
                        stats.dropped.fetch_add(1, Ordering::SeqCst);
                        debug!(address = %msg.address, error = %e, "dropping unmappable OSC message");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exalink_core::types::PlaybackState;
    use exalink_proto::osc::{OscArg, OscMessage};

    /// Spawn an ingress on a loopback port with its own bus.
    async fn test_ingress() -> (OscIngress, Arc<StatusBus>, UdpTransport) {
        let bus = Arc::new(StatusBus::default());
        let ingress = OscIngress::bind(
            IngressConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                prefix: "exaplay".to_string(),
            },
            Arc::clone(&bus),
        )
        .await
        .unwrap();
        let sender = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        (ingress, bus, sender)
    }

    fn status_packet(composition: &str, args: Vec<OscArg>) -> Vec<u8> {
        osc::encode_message(&OscMessage {
            address: format!("/exaplay/status/{composition}"),
            args,
        })
    }

    async fn recv_event(
        sub: &mut crate::bus::Subscription,
    ) -> exalink_core::events::StatusEvent {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timed out waiting for status event")
            .expect("bus closed")
    }

    #[tokio::test]
    async fn status_push_is_published() {
        let (ingress, bus, sender) = test_ingress().await;
        let mut sub = bus.subscribe();

        let packet = status_packet(
            "comp1",
            vec![
                OscArg::Int(0),
                OscArg::Float(0.0),
                OscArg::Int(0),
                OscArg::Int(-1),
                OscArg::Float(0.0),
            ],
        );
        sender.send_to(&packet, ingress.local_addr()).await.unwrap();

        let event = recv_event(&mut sub).await;
        assert_eq!(event.composition, "comp1");
        assert_eq!(event.status.state, PlaybackState::Stopped);
        assert_eq!(event.status.clip_index, -1);

        let stats = ingress.stats();
        assert_eq!(stats.received(), 1);
        assert_eq!(stats.published(), 1);
        assert_eq!(stats.dropped(), 0);

        ingress.shutdown().await;
    }

    #[tokio::test]
    async fn cuetime_push_is_published_as_playing() {
        let (ingress, bus, sender) = test_ingress().await;
        let mut sub = bus.subscribe();

        let packet = osc::encode_message(&OscMessage {
            address: "/exaplay/cuetime/comp1".to_string(),
            args: vec![OscArg::Float(15.6)],
        });
        sender.send_to(&packet, ingress.local_addr()).await.unwrap();

        let event = recv_event(&mut sub).await;
        assert_eq!(event.status.state, PlaybackState::Playing);
        assert!((event.status.time_seconds - 15.6).abs() < 1e-5);

        ingress.shutdown().await;
    }

    #[tokio::test]
    async fn garbage_is_dropped_and_counted_without_stopping_the_loop() {
        let (ingress, bus, sender) = test_ingress().await;
        let mut sub = bus.subscribe();
        let dest = ingress.local_addr();

        // Undecodable bytes, then an unmatched prefix, then a bad state
        // code: all dropped. A valid packet afterwards still flows.
        sender.send_to(&[0xFF, 0xFF, 0x00, 0x01], dest).await.unwrap();
        let unmatched = osc::encode_message(&OscMessage {
            address: "/lighting/status/comp1".to_string(),
            args: vec![OscArg::Int(1)],
        });
        sender.send_to(&unmatched, dest).await.unwrap();
        let bad_state = status_packet(
            "comp1",
            vec![
                OscArg::Int(9),
                OscArg::Float(0.0),
                OscArg::Int(0),
                OscArg::Int(-1),
                OscArg::Float(0.0),
            ],
        );
        sender.send_to(&bad_state, dest).await.unwrap();

        let good = status_packet(
            "comp1",
            vec![
                OscArg::Int(1),
                OscArg::Float(15.65),
                OscArg::Int(939),
                OscArg::Int(2),
                OscArg::Float(300.0),
            ],
        );
        sender.send_to(&good, dest).await.unwrap();

        let event = recv_event(&mut sub).await;
        assert_eq!(event.status.state, PlaybackState::Playing);
        assert_eq!(event.status.frame, 939);

        let stats = ingress.stats();
        assert_eq!(stats.received(), 4);
        assert_eq!(stats.published(), 1);
        assert_eq!(stats.dropped(), 3);

        ingress.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let (ingress, _bus, _sender) = test_ingress().await;
        let stats = ingress.stats();
        ingress.shutdown().await;
        // No datagrams were ever received.
        assert_eq!(stats.received(), 0);
    }
}
