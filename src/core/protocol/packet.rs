//! Reader packets and the packet codec
//!
//! Wire layout, one byte per field:
//!
//! ```text
//! [header | length | network id | reader id | node id | command | data (length) | checksum]
//! ```

use super::checksum::{self, MIN_FRAME_LEN};
use super::command::{command_name, Command, HEADER_COMMAND, HEADER_RESPONSE};
use super::decoding::{decode_semantics, DecodedView};
use super::ProtocolError;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::fmt;
use tokio_util::codec::Encoder;

/// Largest payload a one-byte length field can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Offset of the first payload byte
pub const PAYLOAD_OFFSET: usize = 6;

/// Packet direction, derived from the header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketKind {
    /// Host to reader (0xAA)
    Command,
    /// Reader to host (0x55)
    Response,
    /// Any other header value
    Unknown(u8),
}

impl PacketKind {
    /// Classify a header byte
    pub fn from_header(header: u8) -> Self {
        match header {
            HEADER_COMMAND => PacketKind::Command,
            HEADER_RESPONSE => PacketKind::Response,
            other => PacketKind::Unknown(other),
        }
    }
}

/// A complete, checksummed frame. Immutable once built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    bytes: Bytes,
}

impl Packet {
    /// Wrap a complete frame whose last byte is already the checksum.
    ///
    /// The checksum is not verified here; see [`Packet::verify`].
    pub fn from_frame(bytes: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooShort(bytes.len()));
        }
        Ok(Self { bytes })
    }

    /// Wrap a frame the decoder has already length-checked
    pub(super) fn from_complete_frame(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= MIN_FRAME_LEN);
        Self { bytes }
    }

    /// Append the checksum to a frame that does not carry one yet.
    pub fn with_checksum(mut bytes: Vec<u8>) -> Result<Self, ProtocolError> {
        if bytes.len() < MIN_FRAME_LEN - 1 {
            return Err(ProtocolError::FrameTooShort(bytes.len()));
        }
        bytes.push(checksum::checksum_unterminated(&bytes));
        Ok(Self {
            bytes: Bytes::from(bytes),
        })
    }

    /// Build a packet from raw bytes, appending a checksum only when the
    /// sequence is exactly one byte short of what its length field announces.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ProtocolError> {
        match bytes.get(1) {
            Some(&len) if bytes.len() == MIN_FRAME_LEN - 1 + len as usize => {
                Self::with_checksum(bytes)
            }
            _ => Self::from_frame(bytes),
        }
    }

    /// Header byte
    pub fn header(&self) -> u8 {
        self.bytes[0]
    }

    /// Length field, as transmitted
    pub fn length(&self) -> u8 {
        self.bytes[1]
    }

    /// Network id
    pub fn network_id(&self) -> u8 {
        self.bytes[2]
    }

    /// Reader id
    pub fn reader_id(&self) -> u8 {
        self.bytes[3]
    }

    /// Node id
    pub fn node_id(&self) -> u8 {
        self.bytes[4]
    }

    /// Raw opcode
    pub fn command_code(&self) -> u8 {
        self.bytes[5]
    }

    /// Opcode, if it is a known command
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command_code())
    }

    /// Bytes between the command byte and the checksum
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PAYLOAD_OFFSET..self.bytes.len() - 1]
    }

    /// Trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Direction of the packet
    pub fn kind(&self) -> PacketKind {
        PacketKind::from_header(self.header())
    }

    /// True for frames sent by a reader
    pub fn is_response(&self) -> bool {
        self.header() == HEADER_RESPONSE
    }

    /// Recompute the checksum and compare it with the trailing byte
    pub fn verify(&self) -> bool {
        checksum::verify_frame(&self.bytes)
    }

    /// Whether the length field matches the payload actually carried
    pub fn is_length_consistent(&self) -> bool {
        self.payload().len() == self.length() as usize
    }

    /// Semantic view of the payload
    pub fn decode(&self) -> DecodedView {
        decode_semantics(self)
    }

    /// Full frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the frame bytes
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a packet holds at least a minimal frame
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Frame as a hex string
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// One-line summary, e.g. `[PC->Reader][Node:1][CMD:Ping Reader]`
    pub fn pretty(&self) -> String {
        let name = command_name(self.command_code());
        if self.header() == HEADER_COMMAND {
            format!("[PC->Reader][Node:{}][CMD:{}]", self.node_id(), name)
        } else {
            format!("[PC<-Reader][Node:{}][RSP:{}]", self.node_id(), name)
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet(bin={})", self.hex())
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encoder/validator for reader packets
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    /// Build a checksummed packet.
    ///
    /// Fails with [`ProtocolError::InvalidPayloadLength`] when the payload does
    /// not fit the one-byte length field.
    pub fn encode(
        header: u8,
        command: u8,
        network_id: u8,
        reader_id: u8,
        node_id: u8,
        payload: &[u8],
    ) -> Result<Packet, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::InvalidPayloadLength(payload.len()));
        }
        let mut bytes = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
        bytes.push(header);
        bytes.push(payload.len() as u8);
        bytes.push(network_id);
        bytes.push(reader_id);
        bytes.push(node_id);
        bytes.push(command);
        bytes.extend_from_slice(payload);
        Packet::with_checksum(bytes)
    }

    /// Build a host-to-reader command packet
    pub fn command(
        command: Command,
        network_id: u8,
        reader_id: u8,
        node_id: u8,
        payload: &[u8],
    ) -> Result<Packet, ProtocolError> {
        Self::encode(HEADER_COMMAND, command.opcode(), network_id, reader_id, node_id, payload)
    }

    /// Parse a complete, already checksummed frame
    pub fn decode(bytes: &[u8]) -> Result<Packet, ProtocolError> {
        Packet::from_frame(Bytes::copy_from_slice(bytes))
    }

    /// XOR checksum of a complete frame (header and trailer excluded)
    pub fn checksum_of(bytes: &[u8]) -> u8 {
        checksum::checksum_of(bytes)
    }

    /// Verify a packet's trailing checksum
    pub fn verify(packet: &Packet) -> bool {
        packet.verify()
    }

    /// Interpret a packet's payload by opcode
    pub fn decode_semantics(packet: &Packet) -> DecodedView {
        decode_semantics(packet)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
