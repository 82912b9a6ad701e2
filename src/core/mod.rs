//! Core module containing the reader network stack
//!
//! This module provides:
//! - Wire protocol: packets, checksums, frame decoding and payload decoding
//! - Transport abstraction with a serial port implementation
//! - Event dispatch to registered listeners
//! - Reply correlation for request/response commands
//! - Network controller and per-reader commands
//! - Traffic logging

pub mod dispatch;
pub mod logger;
pub mod network;
pub mod protocol;
pub mod reader;
pub mod reply;
pub mod transport;
