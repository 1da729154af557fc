//! Unified error type for SocketForge.

use socketforge_protocol::ProtocolError;
use socketforge_retry::RetryError;
use socketforge_room::RoomError;
use socketforge_session::SessionError;
use socketforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` lift sub-crate errors
/// straight into this one.
#[derive(Debug, thiserror::Error)]
pub enum SocketForgeError {
    /// A transport-level error (connect, send, receive, HTTP status).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid packet).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad URI, rejected namespace, timeout).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Retry(#[from] RetryError),
}
