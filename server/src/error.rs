//! Errors raised by the ECON protocol client

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EconError {
    /// The console closed the stream, or there is no live connection
    #[error("connection to {addr} has been closed")]
    Closed { addr: String },

    /// Socket fault while connecting, reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The handshake did not end with the success marker
    #[error("failed to authenticate to {addr}")]
    Authentication { addr: String },

    /// Command name is not in the allow-list
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl EconError {
    /// True for faults the ingest loop recovers from by reconnecting
    pub fn is_connection_fault(&self) -> bool {
        !matches!(self, EconError::InvalidCommand(_))
    }
}

pub type Result<T> = std::result::Result<T, EconError>;
