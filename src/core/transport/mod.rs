//! Transport layer for the reader bus
//!
//! The network controller only needs two primitives from a connection:
//! write bytes, and read whatever bytes are available without blocking.
//! Any byte-ordered link (serial port, test double) can implement them.

mod serial;

pub use serial::{list_ports, SerialConfig, SerialTransport};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Write calls completed
    pub packets_sent: u64,
    /// Non-empty reads completed
    pub packets_received: u64,
    /// Errors count
    pub errors: u64,
    /// Connection uptime in seconds
    pub uptime_secs: u64,
}

/// Byte-level connection to the reader bus.
///
/// Implementations must preserve byte order and never duplicate bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Write all of `data`, returning the number of bytes written
    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Return the bytes currently available, or an empty buffer if none.
    /// Must not wait for data to arrive.
    async fn read_available(&mut self) -> Result<Bytes, TransportError>;

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}
