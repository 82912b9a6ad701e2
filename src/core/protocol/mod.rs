//! Reader protocol implementation
//!
//! Provides the wire codec for the reader bus:
//! - XOR frame checksum
//! - Command opcodes and payload value tables
//! - Packet encoding and semantic decoding
//! - Streaming frame decoder with resynchronization

pub mod checksum;
pub mod command;
pub mod decoding;
pub mod framing;
pub mod packet;

pub use checksum::{checksum_of, xor_checksum};
pub use command::{
    AlarmFilter, BaudRate, Code, Command, GainMode, TagType, TransmissionInterval, WireValue,
    BROADCAST_NODE, HEADER_COMMAND, HEADER_RESPONSE,
};
pub use decoding::{
    decode_semantics, DecodedView, PayloadView, PingStatus, SiteCode, TagReport, VersionInfo,
};
pub use framing::{DecodePass, DecoderStats, FrameDecoder, FrameFault};
pub use packet::{Packet, PacketCodec, PacketKind, MAX_PAYLOAD_LEN};

use thiserror::Error;

/// Protocol error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit the one-byte length field
    #[error("Invalid payload length: {0} bytes (max 255)")]
    InvalidPayloadLength(usize),

    /// Byte sequence too short to be a frame
    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Command parameter outside its allowed values
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
