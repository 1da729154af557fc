//! Transport abstraction layer for SocketForge.
//!
//! Provides the [`HttpClient`], [`WebSocketConnector`] and
//! [`WebSocketConnection`] traits that abstract over the two physical
//! carriers Socket.IO runs on (HTTP long-polling and WebSocket), plus the
//! [`ProtocolMessage`] unit they carry.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{TungsteniteConnection, TungsteniteConnector};

use std::fmt;
use std::future::Future;

/// A single unit on the wire: either a text frame or a binary frame.
///
/// Produced by the codecs, moved into the transport, and handed to
/// observers on the way back in. Never shared mutably.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// A UTF-8 text message.
    Text(String),
    /// A raw binary message.
    Bytes(Vec<u8>),
}

impl ProtocolMessage {
    /// Returns `true` for the `Bytes` variant.
    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Returns the text content, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

impl From<String> for ProtocolMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ProtocolMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for ProtocolMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

// ---------------------------------------------------------------------------
// HTTP long-polling
// ---------------------------------------------------------------------------

/// HTTP method used by the polling transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One request issued by the polling transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// GET for long-polls, POST for outbound payloads.
    pub method: HttpMethod,
    /// Absolute request URI, query string included.
    pub uri: String,
    /// Request body. Text bodies go out as `text/plain`, binary bodies
    /// as `application/octet-stream`.
    pub body: Option<ProtocolMessage>,
    /// Set on the very first GET of a session, whose response carries the
    /// Engine.IO handshake.
    pub connect_probe: bool,
}

impl HttpRequest {
    /// Builds a GET request.
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            uri: uri.into(),
            body: None,
            connect_probe: false,
        }
    }

    /// Builds a POST request carrying `body`.
    pub fn post(uri: impl Into<String>, body: ProtocolMessage) -> Self {
        Self {
            method: HttpMethod::Post,
            uri: uri.into(),
            body: Some(body),
            connect_probe: false,
        }
    }

    /// Marks this request as the initial handshake probe.
    pub fn as_connect_probe(mut self) -> Self {
        self.connect_probe = true;
        self
    }
}

/// The request/response plumbing behind the polling transport.
///
/// Implementations own sockets, TLS and headers. The response body comes
/// back as `Text` unless the server answered with a binary content type.
pub trait HttpClient: Send + Sync + 'static {
    /// Issues `request` and returns the response body.
    fn request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<ProtocolMessage, TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// Opens WebSocket connections.
pub trait WebSocketConnector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: WebSocketConnection;

    /// Performs the WebSocket opening handshake against `uri`.
    fn connect(
        &self,
        uri: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open WebSocket. Message boundaries are preserved by the
/// transport: one `send` is one frame.
pub trait WebSocketConnection: Send + Sync + 'static {
    /// Sends one frame.
    fn send(
        &self,
        message: ProtocolMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<ProtocolMessage>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_message_from_str_is_text() {
        let msg = ProtocolMessage::from("42[]");
        assert_eq!(msg.as_text(), Some("42[]"));
        assert!(!msg.is_bytes());
    }

    #[test]
    fn test_protocol_message_from_vec_is_bytes() {
        let msg = ProtocolMessage::from(vec![1, 2, 3]);
        assert!(msg.is_bytes());
        assert_eq!(msg.as_text(), None);
    }

    #[test]
    fn test_http_request_get_has_no_body() {
        let req = HttpRequest::get("http://localhost/socket.io/?EIO=4");
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
        assert!(!req.connect_probe);
    }

    #[test]
    fn test_http_request_connect_probe_flag() {
        let req = HttpRequest::get("http://localhost/").as_connect_probe();
        assert!(req.connect_probe);
    }

    #[test]
    fn test_http_request_post_carries_body() {
        let req = HttpRequest::post("http://localhost/", "2".into());
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body, Some(ProtocolMessage::Text("2".into())));
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }
}
