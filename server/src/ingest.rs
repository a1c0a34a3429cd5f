//! Console ingest loop
//!
//! Reads console lines forever, turns the interesting ones into events and
//! publishes them. Any connection fault (closed stream, socket error, failed
//! authentication) is answered the same way: wait a fixed delay and
//! reconnect. There is no retry limit and no backoff growth.

use crate::econ::EconClient;
use crate::hub::EventHub;
use log::{debug, error, info, warn};
use shared::parse_line;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// What a single pass of the loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStep {
    /// A line parsed into an event, delivered to this many subscribers
    Published(usize),
    /// A line that is not an event of interest
    Skipped,
    Reconnected,
    ReconnectFailed,
}

pub struct IngestLoop {
    econ: Arc<EconClient>,
    hub: Arc<EventHub>,
    reconnect_delay: Duration,
}

impl IngestLoop {
    pub fn new(econ: Arc<EconClient>, hub: Arc<EventHub>) -> Self {
        Self {
            econ,
            hub,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Reads one line, or recovers from one connection fault
    pub async fn step(&self) -> IngestStep {
        match self.econ.readline().await {
            Ok(line) => match parse_line(&line) {
                Some(event) => {
                    let delivered = self.hub.publish(&event).await;
                    debug!("Published {} event to {} subscribers", event.kind(), delivered);
                    IngestStep::Published(delivered)
                }
                None => {
                    debug!("Ignoring console line: {}", line);
                    IngestStep::Skipped
                }
            },
            Err(e) => {
                if e.is_connection_fault() {
                    warn!("Connection to ECON failed: {}", e);
                } else {
                    error!("Unexpected error reading from ECON: {}", e);
                }
                sleep(self.reconnect_delay).await;

                info!("Reconnecting to {}", self.econ.addr());
                match self.econ.connect().await {
                    Ok(()) => IngestStep::Reconnected,
                    // Logged by connect; the next pass retries
                    Err(_) => IngestStep::ReconnectFailed,
                }
            }
        }
    }

    /// Runs until the task is dropped
    pub async fn run(&self) {
        info!("Ingesting console output from {}", self.econ.addr());
        loop {
            self.step().await;
        }
    }
}
