//! Turns application values into wire packets.
//!
//! ```text
//! serialize(["event", <bytes>])  with namespace "/admin", id 5
//!
//!   "45" "1-" "/admin," "5" "[\"event\",{\"_placeholder\":true,\"num\":0}]"
//!    │    │       │      │        └── JSON with bytes lifted out
//!    │    │       │      └── packet id (only when asking for an ack)
//!    │    │       └── namespace, omitted for the default one
//!    │    └── attachment count, only for binary packets
//!    └── packet type
//! ```
//!
//! followed by one `Bytes` message per attachment, in placeholder order.

use std::fmt::Write;

use socketforge_transport::ProtocolMessage;

use crate::data::PlaceholderVisitor;
use crate::{Data, MessageType, ProtocolError};

/// Engine.IO ping packet.
pub const PING_PACKET: &str = "2";
/// Engine.IO pong packet.
pub const PONG_PACKET: &str = "3";
/// Engine.IO upgrade packet, sent when a WebSocket takes over a polling
/// session.
pub const UPGRADE_PACKET: &str = "5";

/// The JSON text of a payload plus the byte buffers lifted out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationResult {
    /// The payload encoded as JSON, placeholders in place of bytes.
    pub json: String,
    /// The lifted byte buffers, indexed by placeholder `num`.
    pub attachments: Vec<Vec<u8>>,
}

/// Serializes events and acks for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Serializer {
    namespace: Option<String>,
}

impl Serializer {
    /// Creates a serializer for `namespace`.
    ///
    /// `None`, `""` and `"/"` all mean the default namespace, which is
    /// never written on the wire.
    pub fn new(namespace: Option<String>) -> Self {
        let namespace = namespace.filter(|ns| !ns.is_empty() && ns != "/");
        Self { namespace }
    }

    /// The namespace written into packets, `None` for the default one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Encodes `data` as a JSON array, lifting out every byte buffer.
    pub fn serialize_core(
        &self,
        data: Vec<Data>,
    ) -> Result<SerializationResult, ProtocolError> {
        let mut visitor = PlaceholderVisitor::default();
        let value = visitor.visit(Data::Array(data));
        let json = serde_json::to_string(&value).map_err(ProtocolError::Encode)?;
        Ok(SerializationResult {
            json,
            attachments: visitor.into_attachments(),
        })
    }

    /// Serializes an event that doesn't expect an acknowledgement.
    pub fn serialize(
        &self,
        data: Vec<Data>,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        self.serialize_packet(PacketKind::Event, data, None)
    }

    /// Serializes an event carrying `packet_id`, so the peer can ack it.
    pub fn serialize_with_id(
        &self,
        data: Vec<Data>,
        packet_id: u64,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        self.serialize_packet(PacketKind::Event, data, Some(packet_id))
    }

    /// Serializes the acknowledgement for the event that carried
    /// `packet_id`.
    pub fn serialize_ack_data(
        &self,
        data: Vec<Data>,
        packet_id: u64,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        self.serialize_packet(PacketKind::Ack, data, Some(packet_id))
    }

    /// The namespace connect packet: `40` or `40/ns,`.
    pub fn connect_packet(&self) -> String {
        self.control_packet(MessageType::Connected)
    }

    /// The namespace disconnect packet: `41` or `41/ns,`.
    pub fn disconnect_packet(&self) -> String {
        self.control_packet(MessageType::Disconnected)
    }

    fn control_packet(&self, message_type: MessageType) -> String {
        let mut text = message_type.prefix().to_owned();
        if let Some(ns) = &self.namespace {
            text.push_str(ns);
            text.push(',');
        }
        text
    }

    fn serialize_packet(
        &self,
        kind: PacketKind,
        data: Vec<Data>,
        packet_id: Option<u64>,
    ) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let SerializationResult { json, attachments } = self.serialize_core(data)?;

        let mut text = String::with_capacity(json.len() + 16);
        if attachments.is_empty() {
            text.push_str(kind.plain().prefix());
        } else {
            text.push_str(kind.binary().prefix());
            // Writing to a String cannot fail.
            let _ = write!(text, "{}-", attachments.len());
        }
        if let Some(ns) = &self.namespace {
            text.push_str(ns);
            text.push(',');
        }
        if let Some(id) = packet_id {
            let _ = write!(text, "{id}");
        }
        text.push_str(&json);

        let mut messages = Vec::with_capacity(1 + attachments.len());
        messages.push(ProtocolMessage::Text(text));
        messages.extend(attachments.into_iter().map(ProtocolMessage::Bytes));
        Ok(messages)
    }
}

#[derive(Clone, Copy)]
enum PacketKind {
    Event,
    Ack,
}

impl PacketKind {
    fn plain(self) -> MessageType {
        match self {
            Self::Event => MessageType::Event,
            Self::Ack => MessageType::Ack,
        }
    }

    fn binary(self) -> MessageType {
        match self {
            Self::Event => MessageType::BinaryEvent,
            Self::Ack => MessageType::BinaryAck,
        }
    }
}
