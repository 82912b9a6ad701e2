//! Traffic logging
//!
//! [`TrafficLogger`] listens on a dispatcher and writes every raw chunk and
//! every decoded packet to `tracing` under the `rfidnet::traffic` target.
//! [`init_tracing`] installs a console subscriber for binaries and demos.

use crate::core::dispatch::{EventDispatcher, EventKind, ListenerId, NetworkEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info"` or `"rfidnet=debug"`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Counters of what a traffic logger has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    /// Raw chunks logged
    pub chunks: u64,
    /// Raw bytes logged
    pub bytes: u64,
    /// Decoded packets logged
    pub packets: u64,
}

/// Dispatcher listener that logs bus traffic
pub struct TrafficLogger {
    dispatcher: Arc<EventDispatcher>,
    raw_id: ListenerId,
    packet_id: ListenerId,
    counters: Arc<Mutex<TrafficCounters>>,
}

impl TrafficLogger {
    /// Start logging events published by `dispatcher`
    pub fn attach(dispatcher: &Arc<EventDispatcher>) -> Self {
        let counters = Arc::new(Mutex::new(TrafficCounters::default()));

        let raw_counters = Arc::clone(&counters);
        let raw_id = dispatcher.subscribe(EventKind::RawData, move |event| {
            if let NetworkEvent::RawData { data, received_at } = event {
                {
                    let mut c = raw_counters.lock();
                    c.chunks += 1;
                    c.bytes += data.len() as u64;
                }
                tracing::debug!(
                    target: "rfidnet::traffic",
                    "[{}] {}",
                    received_at.format("%x %X"),
                    hex::encode(data)
                );
            }
        });

        let packet_counters = Arc::clone(&counters);
        let packet_id = dispatcher.subscribe(EventKind::PacketDecoded, move |event| {
            if let NetworkEvent::PacketDecoded {
                packet,
                received_at,
            } = event
            {
                packet_counters.lock().packets += 1;
                let decoded = serde_json::to_string(&packet.decode())
                    .unwrap_or_else(|e| format!("<unserializable: {e}>"));
                tracing::info!(
                    target: "rfidnet::traffic",
                    "[{}] {} {}",
                    received_at.format("%H:%M:%S%.6f"),
                    packet.pretty(),
                    decoded
                );
            }
        });

        Self {
            dispatcher: Arc::clone(dispatcher),
            raw_id,
            packet_id,
            counters,
        }
    }

    /// Traffic seen so far
    pub fn counters(&self) -> TrafficCounters {
        *self.counters.lock()
    }

    /// Stop logging
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for TrafficLogger {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.raw_id);
        self.dispatcher.unsubscribe(self.packet_id);
    }
}
