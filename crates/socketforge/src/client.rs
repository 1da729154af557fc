//! `ClientBuilder` and the [`Client`] handle it produces.
//!
//! The builder collects a [`SessionConfig`] and the server URI, then picks
//! the carrier: WebSocket through `tokio-tungstenite`, long-polling through
//! any [`HttpClient`], or any other [`TransportSession`].

use socketforge_protocol::EngineIoVersion;
use socketforge_session::{
    PollingSession, Session, SessionConfig, TransportKind, TransportSession, WebSocketSession,
};
use socketforge_transport::{HttpClient, TungsteniteConnector, WebSocketConnector};

use crate::SocketForgeError;

/// A client over the default WebSocket carrier.
pub type WebSocketClient = Client<WebSocketSession<TungsteniteConnector>>;

/// Builder for configuring a Socket.IO client.
///
/// # Example
///
/// ```rust,ignore
/// use socketforge::prelude::*;
///
/// let client = ClientBuilder::new("http://localhost:3000")
///     .namespace("/chat")
///     .build_websocket();
/// client.session().on("message", |event| println!("{:?}", event.args));
/// client.connect().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    server_uri: String,
    config: SessionConfig,
}

impl ClientBuilder {
    /// Creates a builder for `server_uri` with default settings.
    pub fn new(server_uri: impl Into<String>) -> Self {
        Self {
            server_uri: server_uri.into(),
            config: SessionConfig::default(),
        }
    }

    /// Selects the Engine.IO generation.
    pub fn engine_io(mut self, version: EngineIoVersion) -> Self {
        self.config.engine_io = version;
        self
    }

    /// Joins `namespace` instead of the default one.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    /// Request path used when the server URI has none.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Adds a query pair sent with every request.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query.push((key.into(), value.into()));
        self
    }

    pub fn connection_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connection_timeout_secs = secs;
        self
    }

    pub fn connect_attempts(mut self, attempts: u32) -> Self {
        self.config.connect_attempts = attempts;
        self
    }

    pub fn send_attempts(mut self, attempts: u32) -> Self {
        self.config.send_attempts = attempts;
        self
    }

    pub fn retry_delay_unit_ms(mut self, millis: u64) -> Self {
        self.config.retry_delay_unit_ms = millis;
        self
    }

    /// Replaces the whole session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Builds a client over `tokio-tungstenite`.
    pub fn build_websocket(self) -> WebSocketClient {
        self.build_with_connector(TungsteniteConnector)
    }

    /// Builds a WebSocket client over a custom connector.
    pub fn build_with_connector<C: WebSocketConnector>(
        mut self,
        connector: C,
    ) -> Client<WebSocketSession<C>> {
        self.config.transport = TransportKind::WebSocket;
        let transport = WebSocketSession::new(connector, self.config.engine_io);
        self.build_with(transport)
    }

    /// Builds a long-polling client issuing requests through `http`.
    pub fn build_polling<H: HttpClient>(mut self, http: H) -> Client<PollingSession<H>> {
        self.config.transport = TransportKind::Polling;
        let transport = PollingSession::new(http, self.config.engine_io);
        self.build_with(transport)
    }

    /// Builds a client over any transport.
    pub fn build_with<T: TransportSession>(self, transport: T) -> Client<T> {
        tracing::debug!(
            uri = %self.server_uri,
            transport = %transport.kind(),
            engine_io = %transport.version(),
            "client built"
        );
        Client {
            server_uri: self.server_uri,
            session: Session::new(transport, self.config),
        }
    }
}

/// A session bound to the server URI it was built for.
pub struct Client<T: TransportSession> {
    server_uri: String,
    session: Session<T>,
}

impl<T: TransportSession> Client<T> {
    /// Connects and joins the configured namespace.
    pub async fn connect(&self) -> Result<(), SocketForgeError> {
        self.session.connect(&self.server_uri).await?;
        Ok(())
    }

    /// Re-attaches to an existing Engine.IO session, e.g. after upgrading
    /// from polling to WebSocket.
    pub async fn resume(&self, sid: &str) -> Result<(), SocketForgeError> {
        self.session.resume(&self.server_uri, sid).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), SocketForgeError> {
        self.session.disconnect().await?;
        Ok(())
    }

    /// The underlying session, for handlers and sends.
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn server_uri(&self) -> &str {
        &self.server_uri
    }
}

impl<T: TransportSession> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            server_uri: self.server_uri.clone(),
            session: self.session.clone(),
        }
    }
}
