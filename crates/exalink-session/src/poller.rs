//! Status poller: periodic `get:status` queries feeding the bus.
//!
//! When the server's push updates are not enabled, the poller keeps the
//! bus live by querying each tracked composition through the session on
//! a fixed interval. It is the interchangeable twin of the OSC ingress:
//! both produce the same canonical events, and consumers cannot tell the
//! paths apart.
//!
//! Poll failures are logged and skipped for that composition and cycle;
//! one unreachable device must never stop subsequent cycles.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::StatusBus;
use crate::session::Session;

/// Configuration for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between poll cycles.
    pub interval: Duration,
    /// Compositions to query each cycle.
    pub compositions: Vec<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            interval: Duration::from_secs(1),
            compositions: Vec::new(),
        }
    }
}

/// Handle to the running poller task.
pub struct Poller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    /// Spawn the poll loop. The first cycle runs immediately.
    pub fn spawn(session: Arc<Session>, bus: Arc<StatusBus>, config: PollerConfig) -> Poller {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(session, bus, config, cancel.clone()));
        Poller { cancel, task }
    }

    /// Stop the poll loop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// The poll loop. Runs as a spawned tokio task.
async fn poll_loop(
    session: Arc<Session>,
    bus: Arc<StatusBus>,
    config: PollerConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval.max(Duration::from_millis(10)));
    // A cycle delayed by retries must not be followed by a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("poller cancelled");
                break;
            }

            _ = ticker.tick() => {
                for composition in &config.compositions {
                    match session.status(composition).await {
                        Ok(status) => {
                            bus.publish(composition, status);
                        }
                        Err(e) => {
                            warn!(
                                composition = %composition,
                                error = %e,
                                "status poll failed, skipping until next cycle"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::session::SessionConfig;
    use exalink_core::types::PlaybackState;
    use exalink_test_harness::{MockTransport, ScriptedConnector};

    fn session_config(max_attempts: u32) -> SessionConfig {
        SessionConfig {
            command_timeout: Duration::from_millis(100),
            connect_timeout: Duration::from_millis(100),
            max_attempts,
            backoff: BackoffPolicy {
                initial: Duration::from_millis(10),
                cap: Duration::from_millis(40),
            },
            queue_depth: 8,
        }
    }

    fn poller_config(compositions: &[&str]) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(100),
            compositions: compositions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_and_publishes_each_cycle() {
        let connector = Arc::new(ScriptedConnector::new());
        let mut mock = MockTransport::new();
        mock.expect_line("get:status,comp1", "1,15.65,939,2,300.0");
        mock.expect_line("get:status,comp1", "0,0.0,0,-1,300.0");
        connector.push_transport(mock);

        let session = Arc::new(Session::spawn(Arc::clone(&connector), session_config(4)));
        let bus = Arc::new(StatusBus::default());
        let mut sub = bus.subscribe();

        let poller = Poller::spawn(Arc::clone(&session), Arc::clone(&bus), poller_config(&["comp1"]));

        let first = sub.recv().await.unwrap();
        assert_eq!(first.status.state, PlaybackState::Playing);
        assert_eq!(first.composition, "comp1");

        let second = sub.recv().await.unwrap();
        assert_eq!(second.status.state, PlaybackState::Stopped);

        // Both cycles ran over the one persistent connection.
        assert_eq!(connector.attempts(), 1);

        poller.shutdown().await;
        match Arc::try_unwrap(session) {
            Ok(session) => session.shutdown().await,
            Err(_) => panic!("poller should have released its session handle"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_does_not_stop_the_next_one() {
        let connector = Arc::new(ScriptedConnector::new());

        // Cycle 1: the connection goes silent, exhausting the 1-attempt
        // budget. Cycle 2: a fresh connection answers.
        let mut silent = MockTransport::new();
        silent.expect_silence("get:status,comp1");
        connector.push_transport(silent);

        let mut responsive = MockTransport::new();
        responsive.expect_line("get:status,comp1", "2,45.2,2714,3,180.0");
        connector.push_transport(responsive);

        let session = Arc::new(Session::spawn(Arc::clone(&connector), session_config(1)));
        let bus = Arc::new(StatusBus::default());
        let mut sub = bus.subscribe();

        let poller = Poller::spawn(Arc::clone(&session), Arc::clone(&bus), poller_config(&["comp1"]));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.status.state, PlaybackState::Paused);
        assert_eq!(connector.attempts(), 2);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn polls_every_tracked_composition() {
        let connector = Arc::new(ScriptedConnector::new());
        let mut mock = MockTransport::new();
        mock.expect_line("get:status,intro", "1,1.0,30,-1,60.0");
        mock.expect_line("get:status,mainloop", "0,0.0,0,-1,600.0");
        connector.push_transport(mock);

        let session = Arc::new(Session::spawn(connector, session_config(4)));
        let bus = Arc::new(StatusBus::default());
        let mut sub = bus.subscribe();

        let poller = Poller::spawn(
            Arc::clone(&session),
            Arc::clone(&bus),
            poller_config(&["intro", "mainloop"]),
        );

        let first = sub.recv().await.unwrap();
        assert_eq!(first.composition, "intro");
        let second = sub.recv().await.unwrap();
        assert_eq!(second.composition, "mainloop");

        poller.shutdown().await;
    }
}
