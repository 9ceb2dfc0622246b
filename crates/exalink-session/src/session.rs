//! The session manager: single point of truth for device connectivity
//! and command sequencing.
//!
//! One tokio task owns the TCP transport exclusively and processes all
//! command/reply exchanges. The public [`Session`] handle feeds it
//! through a bounded mpsc queue, which is the sole ordering arbiter:
//! commands are served strictly in submission order, one in flight at a
//! time, because the device protocol is a single ordered text stream
//! with no request identifiers -- interleaved writes would desynchronize
//! the reply decoder.
//!
//! Transport-class failures (timeouts, connection loss) discard the
//! connection and retry on a fresh one after exponential backoff, up to
//! the configured attempt budget. Protocol-class failures (`ERR` replies,
//! malformed payloads) surface immediately: resending a command will not
//! fix a bad reply. The device protocol is idempotent per command, so
//! resending a possibly-delivered command on a new connection is safe.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use exalink_core::error::{Error, Result};
use exalink_core::transport::{Connector, Transport};
use exalink_core::types::{Command, ConnectionState, Status};
use exalink_proto::wire::{self, FrameDecode, Reply, ReplyKind};

use crate::backoff::BackoffPolicy;

/// Grace period added to the caller-side wait beyond the actor's own
/// worst-case budget, covering queueing ahead of this request.
const REPLY_GRACE: Duration = Duration::from_millis(500);

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for one command/reply exchange on the wire.
    pub command_timeout: Duration,
    /// Deadline for one connection attempt.
    pub connect_timeout: Duration,
    /// Total attempt budget per submit, connection dials included.
    /// A submit fails with `DeviceUnreachable` after exactly this many
    /// failed attempts. Minimum 1.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
    /// Capacity of the FIFO request queue.
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            command_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            max_attempts: 4,
            backoff: BackoffPolicy::default(),
            queue_depth: 32,
        }
    }
}

impl SessionConfig {
    /// Worst-case wall-clock bound for one submit: every attempt dials
    /// and waits out the exchange deadline, with maximum jitter on every
    /// backoff delay.
    fn submit_deadline(&self, exchange_timeout: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let mut total = (self.connect_timeout + exchange_timeout) * attempts;
        for attempt in 0..attempts.saturating_sub(1) {
            let base = self.backoff.base_delay(attempt);
            total += base + base / 4;
        }
        total + REPLY_GRACE
    }
}

/// One queued request: encoded bytes, expected reply shape, deadline,
/// and the caller's single-fulfillment reply slot.
struct SubmitRequest {
    bytes: Vec<u8>,
    kind: ReplyKind,
    timeout: Duration,
    reply: oneshot::Sender<Result<Reply>>,
}

/// Handle to the session actor.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping
/// the handle (or calling [`shutdown`](Session::shutdown)) stops the
/// actor and closes the connection.
pub struct Session {
    tx: mpsc::Sender<SubmitRequest>,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    config: SessionConfig,
}

impl Session {
    /// Spawn the session actor with the given connector and config.
    ///
    /// No connection is dialed until the first submit.
    pub fn spawn<C: Connector + 'static>(connector: C, config: SessionConfig) -> Session {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8()));
        let cancel = CancellationToken::new();

        let actor = SessionActor {
            connector: Box::new(connector),
            config: config.clone(),
            transport: None,
            state: Arc::clone(&state),
        };
        let task = tokio::spawn(actor.run(rx, cancel.clone()));

        Session {
            tx,
            state,
            cancel,
            task,
            config,
        }
    }

    /// Submit a command with the configured exchange timeout.
    pub async fn submit(&self, command: Command) -> Result<Reply> {
        self.submit_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Submit a command with an explicit exchange timeout.
    ///
    /// The command is validated and encoded before it is enqueued, so a
    /// caller error ([`Error::InvalidCommand`]) surfaces without touching
    /// the wire. The returned future resolves when the exchange is
    /// fulfilled or the retry budget is exhausted; if the outer deadline
    /// expires first only this caller's wait is abandoned -- the actor
    /// still completes the in-flight exchange and discards the reply,
    /// keeping the command stream in sync.
    pub async fn submit_with_timeout(&self, command: Command, timeout: Duration) -> Result<Reply> {
        let bytes = wire::encode(&command)?;
        let kind = ReplyKind::for_command(&command);

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SubmitRequest {
                bytes,
                kind,
                timeout,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        match tokio::time::timeout(self.config.submit_deadline(timeout), reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Non-blocking snapshot of the connection state.
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Query and map a composition's status.
    pub async fn status(&self, composition: &str) -> Result<Status> {
        let reply = self
            .submit(Command::GetStatus {
                composition: composition.to_string(),
            })
            .await?;
        match reply {
            Reply::Status(status) => Ok(status),
            other => Err(unexpected_reply("status", other)),
        }
    }

    /// Query a composition's volume.
    pub async fn volume(&self, composition: &str) -> Result<u8> {
        let reply = self
            .submit(Command::GetVolume {
                composition: composition.to_string(),
            })
            .await?;
        match reply {
            Reply::Volume(value) => Ok(value),
            other => Err(unexpected_reply("volume", other)),
        }
    }

    /// Query the server version.
    pub async fn version(&self) -> Result<String> {
        match self.submit(Command::GetVersion).await? {
            Reply::Version(version) => Ok(version),
            other => Err(unexpected_reply("version", other)),
        }
    }

    /// Probe reachability with a version query.
    pub async fn ping(&self) -> bool {
        self.version().await.is_ok()
    }

    /// Stop the actor and close the connection.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

fn unexpected_reply(expected: &str, got: Reply) -> Error {
    Error::Protocol {
        message: format!("expected {expected} reply"),
        raw: format!("{got:?}"),
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The actor state: exclusive owner of the transport.
struct SessionActor {
    connector: Box<dyn Connector>,
    config: SessionConfig,
    transport: Option<Box<dyn Transport>>,
    state: Arc<AtomicU8>,
}

impl SessionActor {
    /// The actor loop. Runs as a spawned tokio task until cancelled or
    /// the last handle is dropped.
    async fn run(mut self, mut rx: mpsc::Receiver<SubmitRequest>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("session actor cancelled");
                    break;
                }

                req = rx.recv() => match req {
                    Some(req) => {
                        let result = self.handle_submit(&req.bytes, req.kind, req.timeout).await;
                        // A send failure means the caller abandoned its wait;
                        // the exchange already completed, nothing to do.
                        let _ = req.reply.send(result);
                    }
                    None => {
                        debug!("session handle dropped, exiting actor");
                        break;
                    }
                }
            }
        }

        self.discard_transport().await;
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = ConnectionState::from_u8(self.state.swap(next.as_u8(), Ordering::SeqCst));
        if prev != next {
            debug!(from = %prev, to = %next, "connection state changed");
        }
    }

    /// Run one submit through the attempt budget.
    async fn handle_submit(
        &mut self,
        bytes: &[u8],
        kind: ReplyKind,
        timeout: Duration,
    ) -> Result<Reply> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_err = Error::NotConnected;

        for attempt in 0..attempts {
            if attempt > 0 {
                self.set_state(ConnectionState::BackingOff);
                let delay = self.config.backoff.delay(attempt - 1);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            if self.transport.is_none() {
                self.set_state(ConnectionState::Connecting);
                match tokio::time::timeout(self.config.connect_timeout, self.connector.connect())
                    .await
                {
                    Ok(Ok(transport)) => {
                        self.transport = Some(transport);
                        self.set_state(ConnectionState::Connected);
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, attempt, "connection attempt failed");
                        last_err = e;
                        continue;
                    }
                    Err(_) => {
                        warn!(attempt, "connection attempt timed out");
                        last_err = Error::Timeout;
                        continue;
                    }
                }
            }

            match self.exchange(bytes, timeout).await {
                Ok(line) => return wire::decode_reply(kind, &line),
                Err(e) if e.is_transport() => {
                    warn!(error = %e, attempt, "exchange failed, discarding connection");
                    self.discard_transport().await;
                    last_err = e;
                }
                Err(e) => {
                    // Framing is broken; the stream can no longer be trusted.
                    self.discard_transport().await;
                    return Err(e);
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(Error::DeviceUnreachable {
            attempts,
            last: Box::new(last_err),
        })
    }

    /// Write one command line and read exactly one reply line.
    async fn exchange(&mut self, bytes: &[u8], timeout: Duration) -> Result<String> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        transport.send(bytes).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        let mut line_buf: Vec<u8> = Vec::new();
        let mut recv_buf = [0u8; 256];

        loop {
            match wire::decode_frame(&line_buf)? {
                FrameDecode::Frame { line, consumed } => {
                    line_buf.drain(..consumed);
                    if !line_buf.is_empty() {
                        // One reply per command; the device should never
                        // send more.
                        debug!(bytes = line_buf.len(), "discarding trailing bytes after reply");
                    }
                    return Ok(line);
                }
                FrameDecode::Incomplete => {}
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }

            let n = transport.receive(&mut recv_buf, deadline - now).await?;
            line_buf.extend_from_slice(&recv_buf[..n]);

            if line_buf.len() > wire::MAX_REPLY_LINE {
                return Err(Error::Protocol {
                    message: "reply line exceeds maximum length".into(),
                    raw: String::from_utf8_lossy(&line_buf[..64]).into_owned(),
                });
            }
        }
    }

    async fn discard_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
