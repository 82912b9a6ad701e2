//! # rfidnet
//!
//! Protocol stack for networks of active RFID readers sharing one serial bus:
//! - Binary packet codec with per-command payload decoding
//! - Streaming frame decoder with checksum validation and resynchronization
//! - Event dispatch and request/response correlation over the bus
//! - Network-wide operations (reset, rescan, auto-polling) and per-reader commands
//!
//! ## Example
//!
//! ```rust,no_run
//! use rfidnet::{NetworkConfig, NetworkController, SerialTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = NetworkConfig::load()?;
//!     let transport = SerialTransport::open(config.serial.clone())?;
//!     let network = Arc::new(NetworkController::start(Box::new(transport), config));
//!
//!     for entry in network.readers(true).await?.iter() {
//!         let reader = network.reader(*entry);
//!         println!("{}: {:?}", entry, reader.get_version_info().await?);
//!     }
//!
//!     network.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::config::{ConfigError, NetworkConfig, TimeoutConfig};
pub use crate::core::dispatch::{EventDispatcher, EventKind, ListenerId, NetworkEvent};
pub use crate::core::logger::{init_tracing, TrafficLogger};
pub use crate::core::network::{ControllerState, NetworkController, NetworkError, RosterEntry};
pub use crate::core::protocol::{
    Command, DecodedView, FrameDecoder, Packet, PacketCodec, PacketKind, PayloadView,
    ProtocolError,
};
pub use crate::core::reader::{ReaderAddress, ReaderCommands};
pub use crate::core::reply::ReplyWaiter;
pub use crate::core::transport::{
    SerialConfig, SerialTransport, Transport, TransportError, TransportStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
