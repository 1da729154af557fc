//! WebSocket carrier.
//!
//! One frame per message. Attachments go through the generation's
//! [`FrameCodec`](socketforge_protocol::FrameCodec).

use std::sync::{Arc, Mutex, PoisonError};

use socketforge_protocol::{EngineIoVersion, ProtocolMessage, UPGRADE_PACKET};
use socketforge_transport::{TransportError, WebSocketConnection, WebSocketConnector};

use crate::{TransportKind, TransportSession};

/// A session carried by one WebSocket from `C`.
pub struct WebSocketSession<C: WebSocketConnector> {
    connector: C,
    version: EngineIoVersion,
    connection: Mutex<Option<Arc<C::Connection>>>,
}

impl<C: WebSocketConnector> WebSocketSession<C> {
    pub fn new(connector: C, version: EngineIoVersion) -> Self {
        Self {
            connector,
            version,
            connection: Mutex::new(None),
        }
    }

    fn connection(&self) -> Result<Arc<C::Connection>, TransportError> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| TransportError::ConnectionClosed("websocket not open".into()))
    }
}

impl<C: WebSocketConnector> TransportSession for WebSocketSession<C> {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn version(&self) -> EngineIoVersion {
        self.version
    }

    fn server_uri_scheme(&self, secure: bool) -> &'static str {
        if secure { "wss" } else { "ws" }
    }

    async fn connect_core(
        &self,
        uri: String,
        resume_sid: Option<String>,
    ) -> Result<Vec<ProtocolMessage>, TransportError> {
        tracing::debug!(%uri, "opening websocket");
        let connection = Arc::new(self.connector.connect(&uri).await?);

        if resume_sid.is_some() {
            connection.send(ProtocolMessage::from(UPGRADE_PACKET)).await?;
        }

        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = Some(connection);
        Ok(Vec::new())
    }

    fn on_opened(&self, _sid: &str) {}

    async fn send(&self, messages: Vec<ProtocolMessage>) -> Result<(), TransportError> {
        let connection = self.connection()?;
        let frames = self.version.frame_codec();
        for message in messages {
            let frame = match message {
                ProtocolMessage::Text(text) => ProtocolMessage::Text(text),
                ProtocolMessage::Bytes(bytes) => ProtocolMessage::Bytes(frames.write_frame(bytes)),
            };
            connection.send(frame).await?;
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Vec<ProtocolMessage>>, TransportError> {
        let connection = self.connection()?;
        let message = match connection.recv().await? {
            Some(ProtocolMessage::Bytes(frame)) => {
                ProtocolMessage::Bytes(self.version.frame_codec().read_frame(frame))
            }
            Some(text) => text,
            None => return Ok(None),
        };
        tracing::trace!(bytes = message.is_bytes(), "websocket frame");
        Ok(Some(vec![message]))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match connection {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}
