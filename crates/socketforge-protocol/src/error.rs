//! Error types for the protocol layer.
//!
//! Each crate in SocketForge defines its own error enum. A
//! `ProtocolError` always means the bytes on the wire didn't make sense,
//! never that the network misbehaved.

/// Errors that can occur while encoding or decoding Socket.IO packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an application value to JSON failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A packet body was not the JSON it claimed to be.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The packet is well-formed JSON but violates the protocol, e.g. an
    /// event whose first element isn't a string.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A binary packet header declared more attachments than any peer
    /// plausibly sends.
    #[error("attachment count {declared} exceeds limit {limit}")]
    TooManyAttachments {
        declared: usize,
        limit: usize,
    },

    /// A binary packet received a different number of attachments than its
    /// header declared.
    #[error("attachment mismatch: expected {expected}, received {received}")]
    AttachmentMismatch {
        /// The count declared in the `45<n>-` / `46<n>-` header.
        expected: usize,
        /// How many binary frames actually arrived.
        received: usize,
    },
}
