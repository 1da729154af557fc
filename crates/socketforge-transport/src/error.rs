//! Carrier-level failures. Nothing here knows about Socket.IO packets.

/// Errors raised by an HTTP or WebSocket carrier.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away, or the carrier was never opened.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The TCP/TLS/WebSocket opening handshake failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The HTTP peer answered with a non-success status.
    #[error("http request failed with status {status}")]
    Http {
        /// Status code from the response line.
        status: u16,
    },
}
