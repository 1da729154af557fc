//! The capability interface the session driver calls through.
//!
//! The driver owns the state machine; a [`TransportSession`] only knows
//! how to move [`ProtocolMessage`]s over its carrier. Two implementations
//! ship with the crate:
//!
//! - [`PollingSession`](crate::PollingSession): HTTP long-polling
//! - [`WebSocketSession`](crate::WebSocketSession): one WebSocket

use std::future::Future;

use socketforge_protocol::{EngineIoVersion, ProtocolMessage};
use socketforge_transport::TransportError;

use crate::TransportKind;

pub trait TransportSession: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    /// The Engine.IO generation this transport frames for.
    fn version(&self) -> EngineIoVersion;

    /// The URI scheme requests go out with.
    fn server_uri_scheme(&self, secure: bool) -> &'static str;

    /// The Engine.IO query pairs: `EIO`, `transport`, and `sid` when
    /// resuming.
    fn protocol_queries(&self, sid: Option<&str>) -> Vec<(String, String)> {
        let mut queries = vec![
            ("EIO".to_owned(), self.version().query_value().to_owned()),
            ("transport".to_owned(), self.kind().query_value().to_owned()),
        ];
        if let Some(sid) = sid {
            queries.push(("sid".to_owned(), sid.to_owned()));
        }
        queries
    }

    /// Opens the carrier against `uri`.
    ///
    /// Returns whatever messages the open already produced (the polling
    /// handshake body); WebSocket returns nothing and the handshake
    /// arrives through [`receive`](Self::receive).
    fn connect_core(
        &self,
        uri: String,
        resume_sid: Option<String>,
    ) -> impl Future<Output = Result<Vec<ProtocolMessage>, TransportError>> + Send;

    /// Called once the handshake assigned `sid`.
    fn on_opened(&self, sid: &str);

    /// Sends `messages` in order. Binary messages are attachments and
    /// must follow their header.
    fn send(
        &self,
        messages: Vec<ProtocolMessage>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next batch of inbound messages.
    ///
    /// Returns `Ok(None)` when the carrier closed cleanly.
    fn receive(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<ProtocolMessage>>, TransportError>> + Send;

    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
