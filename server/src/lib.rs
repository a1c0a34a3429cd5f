//! # ECON Bridge Server Library
//!
//! This library connects to a Teeworlds game server's remote console (ECON)
//! and exposes it on two surfaces: an HTTP endpoint for submitting console
//! commands and a WebSocket feed of structured game events.
//!
//! ## Core Responsibilities
//!
//! ### Console Connection
//! A single authenticated TCP connection is shared between command writes and
//! log reads. Reads and writes are serialized by two independent locks, and a
//! reconnect takes both so it never interleaves with either.
//!
//! ### Event Extraction
//! Every console line is run through the line parser from the `shared` crate.
//! Lines that describe chat, joins, leaves, kills, pickups, match starts or
//! player connections become typed events; everything else is ignored.
//!
//! ### Fan-out
//! Events are serialized once and queued for every connected feed subscriber.
//! Queues are unbounded and delivery is best-effort: a subscriber that goes
//! away loses whatever was still queued for it.
//!
//! ## Module Organization
//!
//! - `econ`: console client, handshake, command allow-list and sanitization
//! - `ingest`: the read/parse/publish loop with reconnect-on-failure
//! - `hub`: subscriber registry and fan-out
//! - `feed`: WebSocket delivery sessions
//! - `api`: HTTP command submission
//! - `config`: command-line and environment configuration
//! - `fake_console`: a stand-in ECON server for development and tests
//!
//! ## Failure Handling
//!
//! Connection faults never terminate the process. The ingest loop waits a
//! fixed delay and reconnects, forever. The only errors that reach callers
//! are command rejections (unknown command name, malformed payload) and, on
//! the HTTP surface, an unavailable console.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::econ::EconClient;
//! use server::hub::EventHub;
//! use server::ingest::IngestLoop;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let econ = Arc::new(EconClient::new("127.0.0.1", 8303, "secret"));
//!     let hub = Arc::new(EventHub::new());
//!
//!     econ.connect().await?;
//!     econ.command("say", &["bridge", "online"]).await?;
//!
//!     let mut subscription = hub.subscribe().await;
//!     let ingest = IngestLoop::new(Arc::clone(&econ), Arc::clone(&hub));
//!     tokio::spawn(async move { ingest.run().await });
//!
//!     while let Some(event) = subscription.recv().await {
//!         println!("{}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod econ;
pub mod error;
pub mod fake_console;
pub mod feed;
pub mod hub;
pub mod ingest;
