//! Wire protocol for SocketForge.
//!
//! This crate knows how Socket.IO packets look as text and bytes, and
//! nothing about connections:
//!
//! - **Values** ([`Data`]): JSON-like trees that may hold raw bytes.
//! - **Serializer** ([`Serializer`]): events and acks to wire messages,
//!   lifting bytes out into attachments.
//! - **Decapsulation** ([`decapsulate_raw_text`] and friends): prefix
//!   parsing for inbound text.
//! - **Packets** ([`Packet`]): typed inbound packets for a given
//!   [`EngineIoVersion`].
//! - **Codecs** ([`PayloadCodec`], [`FrameCodec`]): how several messages
//!   share one polling body, and how attachments ride a WebSocket.
//!
//! ```text
//! Transport (ProtocolMessage) → Protocol (Packet) → Session (observers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod data;
mod decapsulator;
mod error;
mod frame;
mod message_type;
mod packet;
mod payload;
mod serializer;
mod version;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use data::Data;
pub use decapsulator::{
    BinaryEventMessageResult, DecapsulationResult, MessageResult,
    decapsulate_binary_event_message, decapsulate_event_message,
    decapsulate_raw_text,
};
pub use error::ProtocolError;
pub use frame::{FrameCodec, WebSocketFrameCodecV3, WebSocketFrameCodecV4};
pub use message_type::MessageType;
pub use packet::{
    AckMessage, BinaryPacket, ConnectErrorMessage, ConnectedMessage,
    EventMessage, MAX_ATTACHMENTS, OpenedMessage, Packet,
};
pub use payload::{
    EngineIo3PayloadCodec, EngineIo4PayloadCodec, PayloadCodec,
    RECORD_SEPARATOR,
};
pub use serializer::{
    PING_PACKET, PONG_PACKET, SerializationResult, Serializer, UPGRADE_PACKET,
};
pub use socketforge_transport::ProtocolMessage;
pub use version::EngineIoVersion;
