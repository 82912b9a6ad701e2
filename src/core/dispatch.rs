//! Event dispatch for the reader network
//!
//! Listeners are plain closures registered per event kind and invoked in
//! registration order on the decoder task. Callbacks must return promptly;
//! anything slow belongs on a channel.

use crate::core::protocol::Packet;
use bytes::Bytes;
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Listener handle returned by [`EventDispatcher::subscribe`]
pub type ListenerId = Uuid;

type Handler = Arc<dyn Fn(&NetworkEvent) + Send + Sync>;

/// Kind of event a listener is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Raw chunk read from the transport
    RawData,
    /// Frame decoded with a valid checksum
    PacketDecoded,
}

/// Events published by the decoder task
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// Raw data received from the transport
    RawData {
        /// Bytes as read
        data: Bytes,
        /// Time the chunk was handed to the decoder
        received_at: DateTime<Local>,
    },
    /// A complete packet was decoded
    PacketDecoded {
        /// Decoded packet
        packet: Packet,
        /// Time the frame completed
        received_at: DateTime<Local>,
    },
}

impl NetworkEvent {
    /// Raw data event stamped now
    pub fn raw(data: Bytes) -> Self {
        NetworkEvent::RawData {
            data,
            received_at: Local::now(),
        }
    }

    /// Packet event stamped now
    pub fn decoded(packet: Packet) -> Self {
        NetworkEvent::PacketDecoded {
            packet,
            received_at: Local::now(),
        }
    }

    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            NetworkEvent::RawData { .. } => EventKind::RawData,
            NetworkEvent::PacketDecoded { .. } => EventKind::PacketDecoded,
        }
    }

    /// Packet carried by a decoded event
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            NetworkEvent::PacketDecoded { packet, .. } => Some(packet),
            NetworkEvent::RawData { .. } => None,
        }
    }

    /// Receive timestamp
    pub fn received_at(&self) -> DateTime<Local> {
        match self {
            NetworkEvent::RawData { received_at, .. }
            | NetworkEvent::PacketDecoded { received_at, .. } => *received_at,
        }
    }
}

struct Listener {
    id: ListenerId,
    kind: EventKind,
    handler: Handler,
}

/// Ordered listener registry
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Listener>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under a fresh id
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&NetworkEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.register(id, kind, handler);
        id
    }

    /// Register a listener under a caller-chosen id.
    ///
    /// Returns `false` and leaves the registry untouched if `id` is already
    /// registered.
    pub fn register<F>(&self, id: ListenerId, kind: EventKind, handler: F) -> bool
    where
        F: Fn(&NetworkEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| l.id == id) {
            return false;
        }
        listeners.push(Listener {
            id,
            kind,
            handler: Arc::new(handler),
        });
        true
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Check whether a listener is registered
    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.read().iter().any(|l| l.id == id)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Notify every listener of the event's kind, in registration order.
    ///
    /// Handlers run with no lock held, so they may subscribe or unsubscribe.
    /// Returns the number of listeners notified.
    pub fn publish(&self, event: &NetworkEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.handler))
            .collect();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
