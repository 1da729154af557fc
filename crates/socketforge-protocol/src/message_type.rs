//! The ten packet kinds that share one text namespace on the wire.
//!
//! Engine.IO control packets take one character (`0`, `2`, `3`); Socket.IO
//! packets ride inside an Engine.IO "message" and therefore take two
//! (`4` followed by the Socket.IO type digit).

use std::fmt;

/// The type of a decoded packet, identified by its leading prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `0`: Engine.IO handshake.
    Opened,
    /// `2`: keepalive probe.
    Ping,
    /// `3`: keepalive answer.
    Pong,
    /// `40`: namespace connected.
    Connected,
    /// `41`: namespace disconnected.
    Disconnected,
    /// `42`: event.
    Event,
    /// `43`: acknowledgement.
    Ack,
    /// `44`: namespace connection refused.
    ConnectError,
    /// `45`: event with binary attachments.
    BinaryEvent,
    /// `46`: acknowledgement with binary attachments.
    BinaryAck,
}

impl MessageType {
    /// The exact wire prefix for this type.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Opened => "0",
            Self::Ping => "2",
            Self::Pong => "3",
            Self::Connected => "40",
            Self::Disconnected => "41",
            Self::Event => "42",
            Self::Ack => "43",
            Self::ConnectError => "44",
            Self::BinaryEvent => "45",
            Self::BinaryAck => "46",
        }
    }

    /// Maps the Socket.IO type digit that follows a leading `4`.
    pub(crate) fn from_socket_io_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Self::Connected),
            '1' => Some(Self::Disconnected),
            '2' => Some(Self::Event),
            '3' => Some(Self::Ack),
            '4' => Some(Self::ConnectError),
            '5' => Some(Self::BinaryEvent),
            '6' => Some(Self::BinaryAck),
            _ => None,
        }
    }

    /// Returns `true` for packets handled inside the session rather than
    /// delivered to application observers.
    pub fn is_control(self) -> bool {
        !matches!(
            self,
            Self::Event | Self::Ack | Self::BinaryEvent | Self::BinaryAck
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
