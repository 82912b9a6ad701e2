//! Streaming frame decoder
//!
//! Bytes arrive from the bus in chunks of any size. The decoder keeps the
//! partially received frame between calls, discards bytes that precede a
//! header byte, and drops frames whose checksum does not match. After a
//! mismatch the bytes of the dropped frame following its header are
//! searched again for a header, so a corrupted length field cannot swallow
//! the frame that comes after it.

use super::checksum::{self, MIN_FRAME_LEN};
use super::command::{HEADER_COMMAND, HEADER_RESPONSE};
use super::packet::Packet;
use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use std::collections::VecDeque;
use tokio_util::codec::Decoder;

/// Default number of completed frames handled by one pass
pub const DEFAULT_MAX_FRAMES_PER_PASS: usize = 64;

/// Id bytes, command byte and checksum byte following the length field
const FIXED_BODY_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    SeekingHeader,
    ReadingLength,
    AccumulatingBody { remaining: usize },
}

/// Non-fatal decoding fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFault {
    /// Bytes seen while searching for a header were dropped
    OutOfSync {
        /// Number of dropped bytes
        discarded: usize,
    },
    /// A complete frame failed its checksum and was dropped
    ChecksumMismatch {
        /// Length of the dropped frame
        len: usize,
        /// Checksum computed over the frame
        expected: u8,
        /// Checksum carried by the frame
        actual: u8,
    },
}

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Input chunks accepted
    pub chunks: u64,
    /// Frames that passed the checksum
    pub frames_decoded: u64,
    /// Frames dropped on checksum mismatch
    pub checksum_failures: u64,
    /// Times the decoder had to skip bytes to find a header
    pub desync_events: u64,
    /// Bytes skipped while searching for a header
    pub desync_bytes: u64,
}

/// Result of one bounded decode pass
#[derive(Debug, Default)]
pub struct DecodePass {
    /// Frames completed with a valid checksum, in arrival order
    pub packets: Vec<Packet>,
    /// Faults seen during the pass
    pub faults: Vec<FrameFault>,
    /// True when no buffered input is left
    pub exhausted: bool,
}

/// Streaming decoder for reader frames
pub struct FrameDecoder {
    state: FrameState,
    frame: Vec<u8>,
    backlog: BytesMut,
    ready: VecDeque<Packet>,
    max_frames_per_pass: usize,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create new decoder
    pub fn new() -> Self {
        Self::with_max_frames_per_pass(DEFAULT_MAX_FRAMES_PER_PASS)
    }

    /// Create a decoder completing at most `max` frames per pass
    pub fn with_max_frames_per_pass(max: usize) -> Self {
        Self {
            state: FrameState::SeekingHeader,
            frame: Vec::with_capacity(64),
            backlog: BytesMut::new(),
            ready: VecDeque::new(),
            max_frames_per_pass: max.max(1),
            stats: DecoderStats::default(),
        }
    }

    /// Queue a chunk of input without decoding it yet
    pub fn extend(&mut self, data: &[u8]) {
        self.stats.chunks += 1;
        self.backlog.extend_from_slice(data);
    }

    /// Add data and return every frame it completes
    pub fn push(&mut self, data: &[u8]) -> Vec<Packet> {
        self.extend(data);
        let mut packets = Vec::new();
        loop {
            let pass = self.decode_pass();
            packets.extend(pass.packets);
            if pass.exhausted {
                return packets;
            }
        }
    }

    /// True while queued input is waiting for another pass
    pub fn has_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// True when a frame has been started but not completed
    pub fn in_frame(&self) -> bool {
        self.state != FrameState::SeekingHeader
    }

    /// Counters since creation
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partial frame and queued input
    pub fn clear(&mut self) {
        self.state = FrameState::SeekingHeader;
        self.frame.clear();
        self.backlog.clear();
        self.ready.clear();
    }

    /// Run the state machine over queued input until it is consumed or
    /// `max_frames_per_pass` frames have completed.
    pub fn decode_pass(&mut self) -> DecodePass {
        let mut input = std::mem::take(&mut self.backlog);
        let mut pass = DecodePass::default();
        let mut completed = 0usize;
        let mut pos = 0usize;

        while pos < input.len() && completed < self.max_frames_per_pass {
            match self.state {
                FrameState::SeekingHeader => {
                    let rest = &input[pos..];
                    let Some(offset) = rest
                        .iter()
                        .position(|&b| is_header(b))
                    else {
                        pass.faults.push(self.out_of_sync(rest));
                        pos = input.len();
                        break;
                    };
                    if offset > 0 {
                        pass.faults.push(self.out_of_sync(&rest[..offset]));
                    }
                    self.frame.clear();
                    self.frame.push(rest[offset]);
                    pos += offset + 1;
                    self.state = FrameState::ReadingLength;
                }
                FrameState::ReadingLength => {
                    let len = input[pos];
                    self.frame.push(len);
                    pos += 1;
                    self.state = FrameState::AccumulatingBody {
                        remaining: FIXED_BODY_LEN + len as usize,
                    };
                }
                FrameState::AccumulatingBody { remaining } => {
                    let take = remaining.min(input.len() - pos);
                    self.frame.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    let remaining = remaining - take;
                    if remaining > 0 {
                        self.state = FrameState::AccumulatingBody { remaining };
                        continue;
                    }
                    self.state = FrameState::SeekingHeader;
                    completed += 1;
                    match self.finish_frame() {
                        Ok(packet) => pass.packets.push(packet),
                        Err((fault, frame)) => {
                            pass.faults.push(fault);
                            let next_header = frame[1..].iter().position(|&b| is_header(b));
                            if let Some(offset) = next_header {
                                let mut requeued =
                                    BytesMut::with_capacity(frame.len() + input.len() - pos);
                                requeued.extend_from_slice(&frame[1 + offset..]);
                                requeued.extend_from_slice(&input[pos..]);
                                input = requeued;
                                pos = 0;
                            }
                        }
                    }
                }
            }
        }

        input.advance(pos);
        self.backlog = input;
        pass.exhausted = self.backlog.is_empty();
        pass
    }

    fn out_of_sync(&mut self, discarded: &[u8]) -> FrameFault {
        tracing::warn!(
            bytes = discarded.len(),
            "Out of sync! Unexpected data: {}",
            hex::encode(discarded)
        );
        self.stats.desync_events += 1;
        self.stats.desync_bytes += discarded.len() as u64;
        FrameFault::OutOfSync {
            discarded: discarded.len(),
        }
    }

    /// On mismatch the dropped frame is handed back for resynchronization
    fn finish_frame(&mut self) -> Result<Packet, (FrameFault, Vec<u8>)> {
        let frame = std::mem::take(&mut self.frame);
        debug_assert!(frame.len() >= MIN_FRAME_LEN);

        let expected = checksum::checksum_of(&frame);
        let actual = frame[frame.len() - 1];
        if expected != actual {
            tracing::warn!(
                expected,
                actual,
                "Checksum failed, discarding frame {}",
                hex::encode(&frame)
            );
            self.stats.checksum_failures += 1;
            let fault = FrameFault::ChecksumMismatch {
                len: frame.len(),
                expected,
                actual,
            };
            return Err((fault, frame));
        }

        self.stats.frames_decoded += 1;
        Ok(Packet::from_complete_frame(Bytes::from(frame)))
    }
}

fn is_header(byte: u8) -> bool {
    byte == HEADER_COMMAND || byte == HEADER_RESPONSE
}

impl Decoder for FrameDecoder {
    type Item = Packet;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !src.is_empty() {
            self.extend(&src[..]);
            src.clear();
        }
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Ok(Some(packet));
            }
            if self.backlog.is_empty() {
                return Ok(None);
            }
            let pass = self.decode_pass();
            self.ready.extend(pass.packets);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::PacketCodec;

    fn frame(header: u8, command: u8, node: u8, payload: &[u8]) -> Vec<u8> {
        PacketCodec::encode(header, command, 0, 0, node, payload)
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn test_single_frame() {
        let bytes = frame(0x55, 0x03, 1, &[0x00]);
        let mut decoder = FrameDecoder::new();
        let packets = decoder.push(&bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_bytes(), &bytes[..]);
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_frame_split_one_byte_at_a_time() {
        let bytes = frame(0x55, 0x0A, 2, &[1, 2, 3]);
        let mut decoder = FrameDecoder::new();
        let mut packets = Vec::new();
        for b in &bytes {
            packets.extend(decoder.push(std::slice::from_ref(b)));
        }
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_bytes(), &bytes[..]);
        assert_eq!(decoder.stats().chunks, bytes.len() as u64);
    }

    #[test]
    fn test_garbage_only_is_discarded() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&[0x01, 0x02, 0x03]).is_empty());
        assert!(!decoder.in_frame());
        assert_eq!(decoder.stats().desync_bytes, 3);
        assert_eq!(decoder.stats().desync_events, 1);
    }

    #[test]
    fn test_checksum_mismatch_is_dropped() {
        let mut bad = frame(0x55, 0x0C, 1, &[1]);
        bad[4] ^= 0x01;
        let good = frame(0x55, 0x0C, 2, &[0]);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bad);
        decoder.extend(&good);
        let pass = decoder.decode_pass();
        assert_eq!(pass.packets.len(), 1);
        assert_eq!(pass.packets[0].node_id(), 2);
        assert!(matches!(
            pass.faults.as_slice(),
            [FrameFault::ChecksumMismatch { .. }]
        ));
        assert_eq!(decoder.stats().checksum_failures, 1);
    }

    #[test]
    fn test_corrupted_length_does_not_swallow_next_frame() {
        let mut bad = frame(0x55, 0x10, 1, &[0x78, 0x07]);
        bad[1] = 0x03;
        let follower = frame(0x55, 0x10, 2, &[0x79]);

        let mut decoder = FrameDecoder::new();
        let mut packets = decoder.push(&bad);
        assert!(decoder.in_frame());
        packets.extend(decoder.push(&follower));
        packets.extend(decoder.push(&follower));

        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.as_bytes() == &follower[..]));
        let stats = decoder.stats();
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.desync_bytes, 0);
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_faults_report_sizes() {
        let mut bad = frame(0x55, 0x0C, 1, &[1]);
        bad[5] ^= 0x01;
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0x00, 0x01]);
        decoder.extend(&bad);
        let pass = decoder.decode_pass();
        assert!(pass.packets.is_empty());
        assert!(matches!(
            pass.faults.as_slice(),
            [
                FrameFault::OutOfSync { discarded: 2 },
                FrameFault::ChecksumMismatch { len: 8, .. }
            ]
        ));
    }

    #[test]
    fn test_pass_bound_keeps_remaining_input() {
        let mut input = Vec::new();
        for node in 1..=5 {
            input.extend(frame(0x55, 0x03, node, &[0]));
        }
        let mut decoder = FrameDecoder::with_max_frames_per_pass(2);
        decoder.extend(&input);

        let first = decoder.decode_pass();
        assert_eq!(first.packets.len(), 2);
        assert!(!first.exhausted);
        assert!(decoder.has_backlog());

        let second = decoder.decode_pass();
        let third = decoder.decode_pass();
        assert_eq!(second.packets.len(), 2);
        assert_eq!(third.packets.len(), 1);
        assert!(third.exhausted);

        let nodes: Vec<u8> = first
            .packets
            .iter()
            .chain(&second.packets)
            .chain(&third.packets)
            .map(Packet::node_id)
            .collect();
        assert_eq!(nodes, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_codec_decoder_yields_one_packet_per_call() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&frame(0x55, 0x03, 1, &[0]));
        src.extend_from_slice(&[0x00, 0x13]);
        src.extend_from_slice(&frame(0xAA, 0x03, 2, &[]));

        let mut decoder = FrameDecoder::new();
        let first = decoder.decode(&mut src).unwrap().unwrap();
        assert!(src.is_empty());
        let second = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(first.node_id(), 1);
        assert_eq!(second.node_id(), 2);
        assert!(decoder.decode(&mut src).unwrap().is_none());
    }
}
