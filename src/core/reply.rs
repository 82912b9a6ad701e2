//! Request/response correlation
//!
//! A [`ReplyWaiter`] is registered with the dispatcher *before* the command
//! is written, captures the first matching response and releases its caller
//! on match or timeout. Dropping the waiter always unregisters it.

use crate::core::dispatch::{EventDispatcher, EventKind, ListenerId};
use crate::core::protocol::Packet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// One outstanding reply
pub struct ReplyWaiter {
    dispatcher: Arc<EventDispatcher>,
    id: ListenerId,
    expected: Option<u8>,
    rx: oneshot::Receiver<Packet>,
}

impl ReplyWaiter {
    /// Register a waiter for a response carrying `expected` as its command
    /// byte, or for any response when `expected` is `None`.
    pub fn register(dispatcher: &Arc<EventDispatcher>, expected: Option<u8>) -> Self {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));

        let id = dispatcher.subscribe(EventKind::PacketDecoded, move |event| {
            let Some(packet) = event.packet() else {
                return;
            };
            if !packet.is_response() {
                return;
            }
            if expected.is_some_and(|cmd| cmd != packet.command_code()) {
                return;
            }
            // first match wins, later ones find the slot empty
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(packet.clone());
            }
        });

        Self {
            dispatcher: Arc::clone(dispatcher),
            id,
            expected,
            rx,
        }
    }

    /// Listener id of this waiter
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Expected reply opcode, `None` for any response
    pub fn expected(&self) -> Option<u8> {
        self.expected
    }

    /// Wait for the reply. Returns `None` if `timeout` elapses first.
    pub async fn await_reply(mut self, timeout: Duration) -> Option<Packet> {
        let reply = match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(packet)) => Some(packet),
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::debug!(
                    expected = ?self.expected,
                    timeout_ms = saturating_millis(timeout),
                    "No reply before timeout"
                );
                None
            }
        };
        self.dispatcher.unsubscribe(self.id);
        reply
    }
}

impl Drop for ReplyWaiter {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.id);
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
