//! Fake reader bus shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rfidnet::{NetworkConfig, Packet, PacketCodec, Transport, TransportError, TransportStats};
use std::collections::VecDeque;
use std::sync::Arc;

/// Produces the bytes a reader network answers to one command packet
pub type Responder = Box<dyn FnMut(&Packet) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct BusState {
    written: Vec<Vec<u8>>,
    inbound: VecDeque<u8>,
    stats: TransportStats,
}

/// In-memory transport that answers commands through a [`Responder`]
pub struct FakeBus {
    state: Arc<Mutex<BusState>>,
    responder: Responder,
    max_chunk: usize,
}

/// Test-side view of a [`FakeBus`]
#[derive(Clone)]
pub struct BusHandle {
    state: Arc<Mutex<BusState>>,
}

impl FakeBus {
    /// Bus answering through `responder`, delivering at most `max_chunk`
    /// bytes per read so frames arrive split
    pub fn new(max_chunk: usize, responder: Responder) -> (Self, BusHandle) {
        let state = Arc::new(Mutex::new(BusState::default()));
        let bus = Self {
            state: Arc::clone(&state),
            responder,
            max_chunk: max_chunk.max(1),
        };
        (bus, BusHandle { state })
    }

    /// Bus that never answers
    pub fn silent() -> (Self, BusHandle) {
        Self::new(64, Box::new(|_: &Packet| None))
    }
}

impl BusHandle {
    /// Every write seen so far
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// Writes that parse as command packets
    pub fn commands(&self) -> Vec<Packet> {
        self.written()
            .into_iter()
            .filter_map(|w| parse_command(&w))
            .collect()
    }

    /// Queue bytes as if a reader had sent them
    pub fn inject(&self, data: &[u8]) {
        self.state.lock().inbound.extend(data.iter().copied());
    }
}

fn parse_command(data: &[u8]) -> Option<Packet> {
    if data.first() != Some(&0xAA) {
        return None;
    }
    PacketCodec::decode(data).ok().filter(Packet::verify)
}

#[async_trait]
impl Transport for FakeBus {
    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let reply = parse_command(data).and_then(|packet| (self.responder)(&packet));
        let mut state = self.state.lock();
        state.written.push(data.to_vec());
        state.stats.bytes_sent += data.len() as u64;
        state.stats.packets_sent += 1;
        if let Some(reply) = reply {
            state.inbound.extend(reply);
        }
        Ok(data.len())
    }

    async fn read_available(&mut self) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock();
        let n = state.inbound.len().min(self.max_chunk);
        if n == 0 {
            return Ok(Bytes::new());
        }
        let chunk: Vec<u8> = state.inbound.drain(..n).collect();
        state.stats.bytes_received += n as u64;
        state.stats.packets_received += 1;
        Ok(Bytes::from(chunk))
    }

    fn connection_info(&self) -> String {
        "fake bus".to_string()
    }

    fn stats(&self) -> TransportStats {
        self.state.lock().stats.clone()
    }
}

/// Response to `request` carrying `payload`
pub fn reply_to(request: &Packet, payload: &[u8]) -> Vec<u8> {
    PacketCodec::encode(
        0x55,
        request.command_code(),
        request.network_id(),
        request.reader_id(),
        request.node_id(),
        payload,
    )
    .unwrap()
    .as_bytes()
    .to_vec()
}

/// Configuration tuned for fast tests
pub fn fast_config() -> NetworkConfig {
    let mut config = NetworkConfig::default();
    config.poll_interval_ms = 1;
    config.break_filler_pairs = 4;
    config.timeouts.ask_ms = 500;
    config.timeouts.ping_ms = 50;
    config.timeouts.probe_delay_ms = 0;
    config
}
