//! Engine.IO protocol generations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{FrameCodec, WebSocketFrameCodecV3, WebSocketFrameCodecV4};
use crate::payload::{EngineIo3PayloadCodec, EngineIo4PayloadCodec, PayloadCodec};

/// The Engine.IO generation a session speaks.
///
/// - `V3` pairs with Socket.IO v2: the client sends pings, polling bodies
///   are length-prefixed, binary WebSocket frames carry a marker byte.
/// - `V4` pairs with Socket.IO v4/v5: the server sends pings, polling
///   bodies are record-separated, binary frames are raw.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EngineIoVersion {
    V3,
    #[default]
    V4,
}

impl EngineIoVersion {
    /// The value of the `EIO` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::V3 => "3",
            Self::V4 => "4",
        }
    }

    /// The polling payload codec for this generation.
    pub fn payload_codec(self) -> &'static dyn PayloadCodec {
        match self {
            Self::V3 => &EngineIo3PayloadCodec,
            Self::V4 => &EngineIo4PayloadCodec,
        }
    }

    /// The WebSocket binary frame codec for this generation.
    pub fn frame_codec(self) -> &'static dyn FrameCodec {
        match self {
            Self::V3 => &WebSocketFrameCodecV3,
            Self::V4 => &WebSocketFrameCodecV4,
        }
    }

    /// Returns `true` when the client, not the server, originates pings.
    pub fn client_sends_pings(self) -> bool {
        matches!(self, Self::V3)
    }
}

impl fmt::Display for EngineIoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EIO{}", self.query_value())
    }
}
