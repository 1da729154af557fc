//! Error types for the session layer.

use socketforge_protocol::ProtocolError;
use socketforge_retry::RetryError;
use socketforge_transport::TransportError;

/// Errors that can occur while connecting, sending, or disconnecting.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The server URI uses a scheme other than http, https, ws or wss.
    /// Never retried.
    #[error("unsupported uri scheme: {0}")]
    UnsupportedScheme(String),

    /// The server URI could not be parsed.
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Retry(#[from] RetryError),

    /// The server refused the namespace connection.
    #[error("connection rejected: {0}")]
    ConnectRejected(String),

    /// The handshake or namespace acknowledgement did not arrive within
    /// the connection timeout.
    #[error("timed out waiting for the server")]
    Timeout,

    /// The operation needs an open session.
    #[error("session is not connected")]
    NotConnected,

    /// Nothing to send.
    #[error("payload is empty")]
    EmptyPayload,

    /// `connect` was called on a session that is already connecting or
    /// open.
    #[error("session is already connected")]
    AlreadyConnected,
}
