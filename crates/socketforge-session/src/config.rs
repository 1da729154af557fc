//! Session configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socketforge_protocol::EngineIoVersion;

// ---------------------------------------------------------------------------
// TransportKind
// ---------------------------------------------------------------------------

/// The physical carrier a session runs on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP long-polling.
    Polling,
    #[default]
    WebSocket,
}

impl TransportKind {
    /// The value of the `transport` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for one client session.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine.IO generation spoken on the wire.
    pub engine_io: EngineIoVersion,

    /// Which transport the facade builds. The session driver itself is
    /// generic over the transport and ignores this field.
    pub transport: TransportKind,

    /// Request path used when the server URI has none.
    ///
    /// Default: `/socket.io/`.
    pub path: String,

    /// Socket.IO namespace, e.g. `/admin`. `None` is the default
    /// namespace.
    pub namespace: Option<String>,

    /// Extra query pairs sent with every request.
    pub query: Vec<(String, String)>,

    /// How long `connect` waits for the handshake and the namespace
    /// acknowledgement.
    ///
    /// Default: 20 seconds.
    pub connection_timeout_secs: u64,

    /// Attempts for the initial transport connect.
    ///
    /// Default: 3.
    pub connect_attempts: u32,

    /// Attempts for each outbound send.
    ///
    /// Default: 1 (no retry).
    pub send_attempts: u32,

    /// Jitter unit between retries; each wait is drawn from
    /// `[0, 3 × unit)`.
    ///
    /// Default: 1 millisecond.
    pub retry_delay_unit_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine_io: EngineIoVersion::V4,
            transport: TransportKind::WebSocket,
            path: "/socket.io/".to_owned(),
            namespace: None,
            query: Vec::new(),
            connection_timeout_secs: 20,
            connect_attempts: 3,
            send_attempts: 1,
            retry_delay_unit_ms: 1,
        }
    }
}

impl SessionConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn retry_delay_unit(&self) -> Duration {
        Duration::from_millis(self.retry_delay_unit_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SessionConfig::default();
        assert_eq!(config.engine_io, EngineIoVersion::V4);
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.path, "/socket.io/");
        assert_eq!(config.connection_timeout(), Duration::from_secs(20));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.send_attempts, 1);
        assert_eq!(config.retry_delay_unit(), Duration::from_millis(1));
    }

    #[test]
    fn test_deserialize_partial_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"engine_io":"v3","transport":"polling","namespace":"/chat"}"#,
        )
        .unwrap();
        assert_eq!(config.engine_io, EngineIoVersion::V3);
        assert_eq!(config.transport, TransportKind::Polling);
        assert_eq!(config.namespace.as_deref(), Some("/chat"));
        assert_eq!(config.connect_attempts, 3);
    }

    #[test]
    fn test_transport_query_value() {
        assert_eq!(TransportKind::Polling.query_value(), "polling");
        assert_eq!(TransportKind::WebSocket.to_string(), "websocket");
    }
}
