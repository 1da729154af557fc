//! Application-facing handlers.
//!
//! Handlers live in an explicit registry. Each notification (one inbound
//! event, one disconnect, ...) is dispatched on its own Tokio task, where
//! the matching handlers run one after another in registration order.
//! Two notifications have no ordering between them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use socketforge_protocol::{Data, ProtocolMessage, Serializer};

use crate::{DisconnectReason, SessionError};

pub(crate) type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;
pub(crate) type ConnectedHandler = Arc<dyn Fn() + Send + Sync>;
pub(crate) type DisconnectedHandler = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub(crate) type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback for `emit_with_ack`, run once with the ack arguments.
pub(crate) type AckCallback = Box<dyn FnOnce(Vec<Data>) + Send>;

/// Hands outbound messages to the session without tying the responder to
/// its transport type.
pub(crate) type Outbound = Arc<dyn Fn(Vec<ProtocolMessage>) + Send + Sync>;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An inbound application event.
pub struct Event {
    pub name: String,
    pub args: Vec<Data>,
    pub namespace: Option<String>,
    responder: Mutex<Option<AckResponder>>,
}

impl Event {
    pub(crate) fn new(
        name: String,
        args: Vec<Data>,
        namespace: Option<String>,
        responder: Option<AckResponder>,
    ) -> Self {
        Self {
            name,
            args,
            namespace,
            responder: Mutex::new(responder),
        }
    }

    /// Returns `true` if the sender asked for an acknowledgement that
    /// hasn't been claimed yet.
    pub fn wants_ack(&self) -> bool {
        self.responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Claims the acknowledgement. Only the first caller gets it.
    pub fn take_ack_responder(&self) -> Option<AckResponder> {
        self.responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("namespace", &self.namespace)
            .field("wants_ack", &self.wants_ack())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AckResponder
// ---------------------------------------------------------------------------

/// Answers one inbound event that carried a packet id.
pub struct AckResponder {
    packet_id: u64,
    serializer: Serializer,
    outbound: Outbound,
}

impl AckResponder {
    pub(crate) fn new(packet_id: u64, serializer: Serializer, outbound: Outbound) -> Self {
        Self {
            packet_id,
            serializer,
            outbound,
        }
    }

    pub fn packet_id(&self) -> u64 {
        self.packet_id
    }

    /// Sends the acknowledgement. The send itself runs in the background.
    pub fn send(self, args: Vec<Data>) -> Result<(), SessionError> {
        let messages = self.serializer.serialize_ack_data(args, self.packet_id)?;
        (self.outbound)(messages);
        Ok(())
    }
}

impl std::fmt::Debug for AckResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckResponder")
            .field("packet_id", &self.packet_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    events: HashMap<String, Vec<EventHandler>>,
    any: Vec<EventHandler>,
    connected: Vec<ConnectedHandler>,
    disconnected: Vec<DisconnectedHandler>,
    error: Vec<ErrorHandler>,
}

/// The handler registry.
#[derive(Default)]
pub(crate) struct Observers {
    registry: RwLock<Registry>,
}

impl Observers {
    pub(crate) fn on(&self, event: &str, handler: EventHandler) {
        self.write()
            .events
            .entry(event.to_owned())
            .or_default()
            .push(handler);
    }

    pub(crate) fn on_any(&self, handler: EventHandler) {
        self.write().any.push(handler);
    }

    pub(crate) fn on_connected(&self, handler: ConnectedHandler) {
        self.write().connected.push(handler);
    }

    pub(crate) fn on_disconnected(&self, handler: DisconnectedHandler) {
        self.write().disconnected.push(handler);
    }

    pub(crate) fn on_error(&self, handler: ErrorHandler) {
        self.write().error.push(handler);
    }

    /// Runs the handlers for `event.name`, then the catch-all handlers.
    pub(crate) fn notify_event(&self, event: Event) {
        let handlers: Vec<EventHandler> = {
            let registry = self.read();
            registry
                .events
                .get(&event.name)
                .into_iter()
                .flatten()
                .chain(registry.any.iter())
                .cloned()
                .collect()
        };
        if handlers.is_empty() {
            tracing::trace!(event = %event.name, "no handler for event");
            return;
        }
        tokio::spawn(async move {
            for handler in handlers {
                handler(&event);
            }
        });
    }

    pub(crate) fn notify_connected(&self) {
        let handlers = self.read().connected.clone();
        if handlers.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for handler in handlers {
                handler();
            }
        });
    }

    pub(crate) fn notify_disconnected(&self, reason: DisconnectReason) {
        let handlers = self.read().disconnected.clone();
        if handlers.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for handler in handlers {
                handler(reason);
            }
        });
    }

    pub(crate) fn notify_error(&self, message: String) {
        let handlers = self.read().error.clone();
        if handlers.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for handler in handlers {
                handler(&message);
            }
        });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
