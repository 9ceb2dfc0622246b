//! Scripted connector for retry and reconnect tests.
//!
//! The session manager dials connections through the
//! [`Connector`](exalink_core::Connector) seam. [`ScriptedConnector`]
//! replays a queue of prepared outcomes -- failures or ready-made
//! [`MockTransport`]s -- and counts how many dials were attempted, which
//! is exactly what the retry-budget properties assert on.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use exalink_core::error::{Error, Result};
use exalink_core::transport::{Connector, Transport};

use crate::mock_transport::MockTransport;

/// A [`Connector`] that replays scripted connect outcomes in order.
///
/// Once the script is exhausted, further dials fail with
/// [`Error::Transport`]. Shared across tasks via `Arc`.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    /// Outcomes consumed front-to-back, one per dial.
    outcomes: Mutex<VecDeque<Result<MockTransport>>>,
    /// Total number of dials attempted.
    attempts: AtomicU32,
}

impl ScriptedConnector {
    /// Create an empty connector; every dial fails until outcomes are pushed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a dial that fails with the given error.
    pub fn push_failure(&self, error: Error) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// Queue `n` dials that fail with [`Error::ConnectionLost`].
    pub fn push_failures(&self, n: usize) {
        for _ in 0..n {
            self.push_failure(Error::ConnectionLost);
        }
    }

    /// Queue a dial that succeeds with a prepared transport.
    pub fn push_transport(&self, transport: MockTransport) {
        self.outcomes.lock().unwrap().push_back(Ok(transport));
    }

    /// How many dials have been attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(e)) => Err(e),
            None => Err(Error::Transport("connector script exhausted".into())),
        }
    }
}
