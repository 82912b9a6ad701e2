//! Reader network controller
//!
//! A [`NetworkController`] owns one bus connection. It runs two tasks:
//! a reader task that drains the transport and a decoder task that frames
//! the byte stream and publishes events. Callers get fire-and-forget
//! [`send`](NetworkController::send) and request/response
//! [`ask`](NetworkController::ask) on top of the asynchronous wire.

use crate::config::NetworkConfig;
use crate::core::dispatch::{EventDispatcher, NetworkEvent};
use crate::core::protocol::{
    BaudRate, Command, DecoderStats, FrameDecoder, Packet, PacketCodec, PingStatus,
    ProtocolError, WireValue, BROADCAST_NODE,
};
use crate::core::reader::{ReaderAddress, ReaderCommands};
use crate::core::reply::ReplyWaiter;
use crate::core::transport::{Transport, TransportError, TransportStats};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Highest node id probed by a rescan
pub const MAX_NODE_ID: u8 = 253;

/// Filler pair that knocks readers out of auto-polling
const BREAK_FILLER: [u8; 2] = [0xFF, b'*'];

/// Address of a reader found by a rescan
pub type RosterEntry = ReaderAddress;

/// Network error types
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid packet or argument
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The controller is no longer running
    #[error("Network controller stopped")]
    Stopped,
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Tasks are running
    Running,
    /// Shut down by the caller
    Stopped,
    /// The reader task hit a transport error
    Error,
}

/// Owner of one reader bus connection
pub struct NetworkController {
    config: NetworkConfig,
    state: Arc<RwLock<ControllerState>>,
    transport: Arc<tokio::sync::Mutex<Box<dyn Transport>>>,
    dispatcher: Arc<EventDispatcher>,
    decoder_stats: Arc<RwLock<DecoderStats>>,
    roster: RwLock<Arc<Vec<RosterEntry>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkController {
    /// Take ownership of an open transport and start the reader and decoder
    /// tasks. Must be called from within a tokio runtime.
    pub fn start(transport: Box<dyn Transport>, config: NetworkConfig) -> Self {
        let state = Arc::new(RwLock::new(ControllerState::Running));
        let dispatcher = Arc::new(EventDispatcher::new());
        let decoder_stats = Arc::new(RwLock::new(DecoderStats::default()));
        tracing::info!(
            network_id = config.network_id,
            connection = %transport.connection_info(),
            "Starting network controller"
        );
        let transport = Arc::new(tokio::sync::Mutex::new(transport));
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            Arc::clone(&state),
            Arc::clone(&transport),
            chunk_tx,
            config.poll_interval(),
        ));
        let decoder = tokio::spawn(decode_loop(
            chunk_rx,
            FrameDecoder::with_max_frames_per_pass(config.max_frames_per_pass),
            Arc::clone(&dispatcher),
            Arc::clone(&decoder_stats),
        ));

        Self {
            config,
            state,
            transport,
            dispatcher,
            decoder_stats,
            roster: RwLock::new(Arc::new(Vec::new())),
            tasks: Mutex::new(vec![reader, decoder]),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Network id placed in network-wide commands
    pub fn network_id(&self) -> u8 {
        self.config.network_id
    }

    /// Get current state
    pub fn state(&self) -> ControllerState {
        *self.state.read()
    }

    /// Check if the tasks are running
    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    /// Event dispatcher fed by the decoder task
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Frame decoder counters
    pub fn decoder_stats(&self) -> DecoderStats {
        *self.decoder_stats.read()
    }

    /// Transport counters
    pub async fn transport_stats(&self) -> TransportStats {
        self.transport.lock().await.stats()
    }

    /// Write a packet, expecting no reply
    pub async fn send(&self, packet: &Packet) -> Result<usize, NetworkError> {
        tracing::debug!("{} {}", packet.pretty(), packet.hex());
        self.send_raw(packet.as_bytes()).await
    }

    /// Write raw bytes
    pub async fn send_raw(&self, data: &[u8]) -> Result<usize, NetworkError> {
        if !self.is_running() {
            return Err(NetworkError::Stopped);
        }
        let mut transport = self.transport.lock().await;
        Ok(transport.write(data).await?)
    }

    /// Send a packet and wait for the response carrying the same opcode.
    ///
    /// `Ok(None)` means no reply arrived within `timeout`.
    pub async fn ask(
        &self,
        packet: &Packet,
        timeout: Duration,
    ) -> Result<Option<Packet>, NetworkError> {
        self.ask_for(packet, Some(packet.command_code()), timeout).await
    }

    /// Send a packet and wait for a response with opcode `expected`, or for
    /// any response when `expected` is `None`.
    pub async fn ask_for(
        &self,
        packet: &Packet,
        expected: Option<u8>,
        timeout: Duration,
    ) -> Result<Option<Packet>, NetworkError> {
        let waiter = ReplyWaiter::register(&self.dispatcher, expected);
        self.send(packet).await?;
        Ok(waiter.await_reply(timeout).await)
    }

    /// Reset every reader on the network
    pub async fn reset(&self) -> Result<Option<Packet>, NetworkError> {
        self.break_auto_polling().await?;
        let packet = self.network_command(Command::ResetNetwork, BROADCAST_NODE, &[])?;
        self.ask(&packet, self.config.timeouts.reset()).await
    }

    /// Ping the reader at `node_id`
    pub async fn ping(
        &self,
        node_id: u8,
        timeout: Duration,
    ) -> Result<Option<PingStatus>, NetworkError> {
        let reply = self.ping_packet(0x00, node_id, timeout).await?;
        Ok(reply.as_ref().map(PingStatus::from_reply))
    }

    /// Ping the reader with persistent id `reader_id`
    pub async fn ping_reader_id(
        &self,
        reader_id: u8,
        timeout: Duration,
    ) -> Result<Option<PingStatus>, NetworkError> {
        let reply = self.ping_packet(reader_id, 0x00, timeout).await?;
        Ok(reply.as_ref().map(PingStatus::from_reply))
    }

    async fn ping_packet(
        &self,
        reader_id: u8,
        node_id: u8,
        timeout: Duration,
    ) -> Result<Option<Packet>, NetworkError> {
        let packet =
            PacketCodec::command(Command::Ping, self.network_id(), reader_id, node_id, &[])?;
        self.ask(&packet, timeout).await
    }

    /// Rebuild the roster with a ping sweep.
    ///
    /// Nodes are probed from 1 upward and the sweep ends at the first node
    /// that does not answer, so a reader behind a gap is not found. A reply
    /// carrying another node id is ignored and the sweep moves on.
    pub async fn rescan(&self) -> Result<Arc<Vec<RosterEntry>>, NetworkError> {
        tracing::info!("Pinging readers...");
        self.break_auto_polling().await?;
        *self.roster.write() = Arc::new(Vec::new());

        let timeouts = self.config.timeouts;
        let mut found = Vec::new();
        for node_id in 1..=MAX_NODE_ID {
            let reply = self.ping_packet(0x00, node_id, timeouts.ping()).await?;
            tokio::time::sleep(timeouts.probe_delay()).await;

            let Some(reply) = reply else {
                tracing::debug!(node_id, "No reply, ending sweep");
                break;
            };
            if reply.node_id() != node_id {
                tracing::warn!(
                    node_id,
                    reply_node = reply.node_id(),
                    "Ignoring ping reply from another node"
                );
                continue;
            }
            let status = PingStatus::from_reply(&reply);
            if status.is_ok() {
                tracing::info!(node_id, reader_id = reply.reader_id(), "Found reader");
                found.push(RosterEntry {
                    network_id: reply.network_id(),
                    reader_id: reply.reader_id(),
                    node_id,
                });
            } else {
                tracing::warn!(
                    node_id,
                    reader_id = reply.reader_id(),
                    code = status.code,
                    "Reader returned {}",
                    status.label()
                );
            }
        }

        tracing::info!("Found {} readers.", found.len());
        let roster = Arc::new(found);
        *self.roster.write() = Arc::clone(&roster);
        Ok(roster)
    }

    /// Readers found by the last rescan
    pub fn roster(&self) -> Arc<Vec<RosterEntry>> {
        self.roster.read().clone()
    }

    /// Known readers, rescanning first when `rescan` is set
    pub async fn readers(&self, rescan: bool) -> Result<Arc<Vec<RosterEntry>>, NetworkError> {
        if rescan {
            self.rescan().await
        } else {
            Ok(self.roster())
        }
    }

    /// Command helper for one reader
    pub fn reader(self: &Arc<Self>, address: ReaderAddress) -> ReaderCommands {
        ReaderCommands::new(Arc::clone(self), address)
    }

    /// Suspend auto-polling by flooding the bus with filler bytes.
    ///
    /// Readers fall back to polling after a power cycle unless auto-polling
    /// is also disabled with [`stop_auto_polling`](Self::stop_auto_polling).
    pub async fn break_auto_polling(&self) -> Result<usize, NetworkError> {
        let filler = BREAK_FILLER.repeat(self.config.break_filler_pairs);
        self.send_raw(&filler).await
    }

    /// Switch the network to auto-polling mode
    pub async fn start_auto_polling(&self) -> Result<Option<Packet>, NetworkError> {
        let packet = self.network_command(Command::EnableAutoPolling, 0x01, &[])?;
        self.ask(&packet, self.config.timeouts.ask()).await
    }

    /// Switch the network to manual polling mode
    pub async fn stop_auto_polling(&self) -> Result<Option<Packet>, NetworkError> {
        self.break_auto_polling().await?;
        let packet = self.network_command(Command::DisableAutoPolling, 0x01, &[])?;
        self.ask(&packet, self.config.timeouts.ask()).await
    }

    /// Broadcast a baud rate change to every reader.
    ///
    /// Fails with [`ProtocolError::InvalidArgument`] before sending anything
    /// when `bps` is not a supported rate.
    pub async fn set_baud_rate(&self, bps: u32) -> Result<Option<Packet>, NetworkError> {
        let baud = BaudRate::from_bps(bps)?;
        let packet = self.network_command(Command::SetBaudRate, BROADCAST_NODE, &[baud.raw()])?;
        self.ask(&packet, self.config.timeouts.ask()).await
    }

    fn network_command(
        &self,
        command: Command,
        node_id: u8,
        payload: &[u8],
    ) -> Result<Packet, ProtocolError> {
        PacketCodec::command(command, self.network_id(), 0x00, node_id, payload)
    }

    /// Stop both tasks and wait for them to finish
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == ControllerState::Running {
                *state = ControllerState::Stopped;
            }
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Network task ended abnormally: {}", e);
            }
        }
        tracing::info!("Network controller stopped");
    }
}

impl Drop for NetworkController {
    fn drop(&mut self) {
        *self.state.write() = ControllerState::Stopped;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for NetworkController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkController")
            .field("network_id", &self.config.network_id)
            .field("state", &self.state())
            .field("readers", &self.roster().len())
            .finish()
    }
}

async fn read_loop(
    state: Arc<RwLock<ControllerState>>,
    transport: Arc<tokio::sync::Mutex<Box<dyn Transport>>>,
    chunk_tx: mpsc::UnboundedSender<Bytes>,
    poll_interval: Duration,
) {
    loop {
        if *state.read() != ControllerState::Running {
            break;
        }

        let data = {
            let mut transport = transport.lock().await;
            transport.read_available().await
        };

        match data {
            Ok(bytes) if !bytes.is_empty() => {
                if chunk_tx.send(bytes).is_err() {
                    break;
                }
            }
            Ok(_) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                tracing::error!("Transport read failed: {}", e);
                let mut state = state.write();
                if *state == ControllerState::Running {
                    *state = ControllerState::Error;
                }
                break;
            }
        }
    }
    tracing::debug!("Reader task finished");
}

async fn decode_loop(
    mut chunk_rx: mpsc::UnboundedReceiver<Bytes>,
    mut decoder: FrameDecoder,
    dispatcher: Arc<EventDispatcher>,
    stats: Arc<RwLock<DecoderStats>>,
) {
    while let Some(chunk) = chunk_rx.recv().await {
        decoder.extend(&chunk);
        dispatcher.publish(&NetworkEvent::raw(chunk));

        loop {
            let pass = decoder.decode_pass();
            for packet in pass.packets {
                tracing::debug!("{} {}", packet.pretty(), packet.hex());
                dispatcher.publish(&NetworkEvent::decoded(packet));
            }
            *stats.write() = decoder.stats();
            if pass.exhausted {
                break;
            }
            tokio::task::yield_now().await;
        }
    }
    tracing::debug!("Decoder task finished");
}
