//! Session lifecycle and the facts learned during the handshake.
//!
//! ```text
//!   Idle ──connect()──→ Connecting ──Opened──→ Open ──disconnect()──→ Closing ──→ Closed
//!                           │                   │                                   ↑
//!                           └───── failure ─────┴──── transport loss / ping timeout ┘
//! ```
//!
//! `Closed` may be left again by a fresh `connect()`.

use std::fmt;
use std::time::Duration;

use socketforge_protocol::EngineIoVersion;

use crate::TransportKind;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// Returns `true` when `connect` may be called.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }
}

// ---------------------------------------------------------------------------
// DisconnectReason
// ---------------------------------------------------------------------------

/// Why a session closed. Local only; never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server sent a disconnect packet for our namespace.
    IoServerDisconnect,
    /// The application called `disconnect`.
    IoClientDisconnect,
    /// The keepalive deadline passed.
    PingTimeout,
    /// The transport closed cleanly underneath us.
    TransportClose,
    /// The transport failed, or the peer broke the protocol.
    TransportError,
}

impl DisconnectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IoServerDisconnect => "io server disconnect",
            Self::IoClientDisconnect => "io client disconnect",
            Self::PingTimeout => "ping timeout",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionInfo
// ---------------------------------------------------------------------------

/// A snapshot of what the session knows about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Engine.IO session id, set by the handshake.
    pub sid: Option<String>,
    /// Socket.IO socket id, set by the v4 namespace acknowledgement.
    pub socket_id: Option<String>,
    /// The namespace this session joins, `None` for the default one.
    pub namespace: Option<String>,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub upgrades: Vec<String>,
    pub max_payload: Option<u64>,
    pub transport: TransportKind,
    pub engine_io: EngineIoVersion,
}

impl SessionInfo {
    pub(crate) fn new(
        transport: TransportKind,
        engine_io: EngineIoVersion,
        namespace: Option<String>,
    ) -> Self {
        Self {
            sid: None,
            socket_id: None,
            namespace,
            ping_interval: Duration::ZERO,
            ping_timeout: Duration::ZERO,
            upgrades: Vec::new(),
            max_payload: None,
            transport,
            engine_io,
        }
    }
}
