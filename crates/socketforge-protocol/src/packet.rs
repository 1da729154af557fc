//! Typed inbound packets.
//!
//! [`Packet::parse`] runs the decapsulation grammar and then builds the
//! typed packet for the given Engine.IO generation. The generations agree
//! on events and acks; they disagree on what the control packets carry:
//!
//! | packet         | v3 body              | v4 body                        |
//! |----------------|----------------------|--------------------------------|
//! | `40` connected | `[/ns,]`             | `[/ns,]{"sid":"…"}`            |
//! | `44` error     | `[/ns,]"message"`    | `[/ns,]{"message":"…"}`        |

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::decapsulator::{
    decapsulate_binary_event_message, decapsulate_event_message,
    decapsulate_raw_text, split_namespace,
};
use crate::{Data, EngineIoVersion, MessageType, ProtocolError};

/// Most attachments one binary packet may declare. The count comes off
/// the wire, so it is capped before anything is buffered against it.
pub const MAX_ATTACHMENTS: usize = 1_000;

/// The Engine.IO handshake sent by the server as packet `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage {
    /// The session id anchoring every later request.
    pub sid: String,
    /// Transports the server would upgrade this session to.
    pub upgrades: Vec<String>,
    /// How often pings are exchanged.
    pub ping_interval: Duration,
    /// How long to wait for the other side of a ping exchange.
    pub ping_timeout: Duration,
    /// Largest polling body the server accepts (v4 only).
    pub max_payload: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenedBody {
    sid: String,
    #[serde(default)]
    upgrades: Vec<String>,
    ping_interval: u64,
    ping_timeout: u64,
    #[serde(default)]
    max_payload: Option<u64>,
}

/// Packet `40`: the namespace accepted the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedMessage {
    pub namespace: Option<String>,
    /// The Socket.IO-level socket id (v4 only).
    pub sid: Option<String>,
}

/// Packet `44`: the namespace refused the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectErrorMessage {
    pub namespace: Option<String>,
    pub message: String,
    /// Extra details some servers attach (v4 only).
    pub data: Option<Value>,
}

/// An application event, with any attachments already restored.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub namespace: Option<String>,
    /// Present when the sender wants an acknowledgement.
    pub id: Option<u64>,
    pub event: String,
    pub args: Vec<Data>,
}

/// An acknowledgement answering the event with the same `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct AckMessage {
    pub namespace: Option<String>,
    pub id: u64,
    pub args: Vec<Data>,
}

/// A binary event or ack whose attachments are still arriving.
///
/// The header packet declares how many binary frames follow; each one is
/// fed to [`push_attachment`](Self::push_attachment) in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPacket {
    pub namespace: Option<String>,
    pub id: Option<u64>,
    pub attachment_count: usize,
    json: Vec<Value>,
    attachments: Vec<Vec<u8>>,
}

impl BinaryPacket {
    /// Returns `true` once every declared attachment has arrived.
    pub fn is_complete(&self) -> bool {
        self.attachments.len() == self.attachment_count
    }

    /// Number of attachments received so far.
    pub fn received(&self) -> usize {
        self.attachments.len()
    }

    /// Records the next attachment.
    ///
    /// # Errors
    /// [`ProtocolError::AttachmentMismatch`] if the packet was already
    /// complete.
    pub fn push_attachment(&mut self, bytes: Vec<u8>) -> Result<(), ProtocolError> {
        if self.is_complete() {
            return Err(ProtocolError::AttachmentMismatch {
                expected: self.attachment_count,
                received: self.attachments.len() + 1,
            });
        }
        self.attachments.push(bytes);
        Ok(())
    }

    /// Restores the attachments and returns the finished event.
    pub fn into_event(self) -> Result<EventMessage, ProtocolError> {
        let (namespace, id, items) = self.restore()?;
        let (event, args) = split_event_name(items)?;
        Ok(EventMessage {
            namespace,
            id,
            event,
            args,
        })
    }

    /// Restores the attachments and returns the finished ack.
    pub fn into_ack(self) -> Result<AckMessage, ProtocolError> {
        let (namespace, id, args) = self.restore()?;
        Ok(AckMessage {
            namespace,
            id: require_ack_id(id)?,
            args,
        })
    }

    fn restore(self) -> Result<(Option<String>, Option<u64>, Vec<Data>), ProtocolError> {
        if !self.is_complete() {
            return Err(ProtocolError::AttachmentMismatch {
                expected: self.attachment_count,
                received: self.attachments.len(),
            });
        }
        let items = self
            .json
            .into_iter()
            .map(|item| Data::from_json_with_attachments(item, &self.attachments))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.namespace, self.id, items))
    }
}

/// A decoded inbound packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Opened(OpenedMessage),
    /// Ping, with the optional probe payload (`"2probe"`).
    Ping(String),
    /// Pong, with the optional probe payload (`"3probe"`).
    Pong(String),
    Connected(ConnectedMessage),
    Disconnected { namespace: Option<String> },
    Event(EventMessage),
    Ack(AckMessage),
    ConnectError(ConnectErrorMessage),
    BinaryEvent(BinaryPacket),
    BinaryAck(BinaryPacket),
}

impl Packet {
    /// Parses raw packet text for the given Engine.IO generation.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] for an unknown prefix or a body
    /// that breaks the packet grammar, [`ProtocolError::Decode`] for bad
    /// JSON.
    pub fn parse(text: &str, version: EngineIoVersion) -> Result<Self, ProtocolError> {
        let raw = decapsulate_raw_text(text);
        let Some(message_type) = raw.message_type.filter(|_| raw.success) else {
            return Err(ProtocolError::InvalidMessage(format!(
                "unrecognized packet prefix in {text:?}"
            )));
        };
        let data = raw.data;

        Ok(match message_type {
            MessageType::Opened => Self::Opened(parse_opened(&data)?),
            MessageType::Ping => Self::Ping(data),
            MessageType::Pong => Self::Pong(data),
            MessageType::Connected => Self::Connected(parse_connected(&data, version)?),
            MessageType::Disconnected => Self::Disconnected {
                namespace: split_namespace(&data).0.map(str::to_owned),
            },
            MessageType::ConnectError => {
                Self::ConnectError(parse_connect_error(&data, version)?)
            }
            MessageType::Event => {
                let body = decapsulate_event_message(&data);
                let (event, args) = split_event_name(
                    parse_array(&body.data)?.into_iter().map(Data::from).collect(),
                )?;
                Self::Event(EventMessage {
                    namespace: body.namespace,
                    id: body.id,
                    event,
                    args,
                })
            }
            MessageType::Ack => {
                let body = decapsulate_event_message(&data);
                Self::Ack(AckMessage {
                    namespace: body.namespace,
                    id: require_ack_id(body.id)?,
                    args: parse_array(&body.data)?.into_iter().map(Data::from).collect(),
                })
            }
            MessageType::BinaryEvent => Self::BinaryEvent(parse_binary(&data)?),
            MessageType::BinaryAck => Self::BinaryAck(parse_binary(&data)?),
        })
    }

    /// Like [`parse`](Self::parse), but malformed packets are logged and
    /// dropped instead of returned as errors.
    ///
    /// # Errors
    /// [`ProtocolError::TooManyAttachments`] is not a malformed packet but a
    /// peer breaking the attachment contract, so it is returned.
    pub fn deserialize(
        text: &str,
        version: EngineIoVersion,
    ) -> Result<Option<Self>, ProtocolError> {
        match Self::parse(text, version) {
            Ok(packet) => Ok(Some(packet)),
            Err(e @ ProtocolError::TooManyAttachments { .. }) => Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed packet");
                Ok(None)
            }
        }
    }

    /// The message type this packet was decoded from.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Opened(_) => MessageType::Opened,
            Self::Ping(_) => MessageType::Ping,
            Self::Pong(_) => MessageType::Pong,
            Self::Connected(_) => MessageType::Connected,
            Self::Disconnected { .. } => MessageType::Disconnected,
            Self::Event(_) => MessageType::Event,
            Self::Ack(_) => MessageType::Ack,
            Self::ConnectError(_) => MessageType::ConnectError,
            Self::BinaryEvent(_) => MessageType::BinaryEvent,
            Self::BinaryAck(_) => MessageType::BinaryAck,
        }
    }
}

fn parse_opened(data: &str) -> Result<OpenedMessage, ProtocolError> {
    let body: OpenedBody = serde_json::from_str(data).map_err(ProtocolError::Decode)?;
    Ok(OpenedMessage {
        sid: body.sid,
        upgrades: body.upgrades,
        ping_interval: Duration::from_millis(body.ping_interval),
        ping_timeout: Duration::from_millis(body.ping_timeout),
        max_payload: body.max_payload,
    })
}

fn parse_connected(
    data: &str,
    version: EngineIoVersion,
) -> Result<ConnectedMessage, ProtocolError> {
    let (namespace, rest) = split_namespace(data);
    let sid = match version {
        EngineIoVersion::V3 => None,
        EngineIoVersion::V4 if rest.is_empty() => None,
        EngineIoVersion::V4 => {
            let body: Value = serde_json::from_str(rest).map_err(ProtocolError::Decode)?;
            body.get("sid").and_then(Value::as_str).map(str::to_owned)
        }
    };
    Ok(ConnectedMessage {
        namespace: namespace.map(str::to_owned),
        sid,
    })
}

fn parse_connect_error(
    data: &str,
    version: EngineIoVersion,
) -> Result<ConnectErrorMessage, ProtocolError> {
    let (namespace, rest) = split_namespace(data);
    let namespace = namespace.map(str::to_owned);

    // v3 servers send a JSON string but older ones send bare text.
    let parsed = serde_json::from_str::<Value>(rest);
    let (message, data) = match (version, parsed) {
        (EngineIoVersion::V4, Ok(Value::Object(mut body))) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            (message, body.remove("data"))
        }
        (EngineIoVersion::V4, Ok(other)) => {
            return Err(ProtocolError::InvalidMessage(format!(
                "connect error body must be an object, got {other}"
            )));
        }
        (EngineIoVersion::V4, Err(e)) => return Err(ProtocolError::Decode(e)),
        (EngineIoVersion::V3, Ok(Value::String(message))) => (message, None),
        (EngineIoVersion::V3, _) => (rest.to_owned(), None),
    };

    Ok(ConnectErrorMessage {
        namespace,
        message,
        data,
    })
}

fn parse_binary(data: &str) -> Result<BinaryPacket, ProtocolError> {
    let body = decapsulate_binary_event_message(data).ok_or_else(|| {
        ProtocolError::InvalidMessage("binary packet without attachment count".into())
    })?;
    if body.attachment_count > MAX_ATTACHMENTS {
        return Err(ProtocolError::TooManyAttachments {
            declared: body.attachment_count,
            limit: MAX_ATTACHMENTS,
        });
    }
    Ok(BinaryPacket {
        namespace: body.namespace,
        id: body.id,
        attachment_count: body.attachment_count,
        json: parse_array(&body.data)?,
        attachments: Vec::new(),
    })
}

fn parse_array(data: &str) -> Result<Vec<Value>, ProtocolError> {
    match serde_json::from_str(data).map_err(ProtocolError::Decode)? {
        Value::Array(items) => Ok(items),
        other => Err(ProtocolError::InvalidMessage(format!(
            "packet data must be an array, got {other}"
        ))),
    }
}

fn split_event_name(mut items: Vec<Data>) -> Result<(String, Vec<Data>), ProtocolError> {
    if items.is_empty() {
        return Err(ProtocolError::InvalidMessage("event without a name".into()));
    }
    match items.remove(0) {
        Data::String(event) => Ok((event, items)),
        other => Err(ProtocolError::InvalidMessage(format!(
            "event name must be a string, got {other:?}"
        ))),
    }
}

fn require_ack_id(id: Option<u64>) -> Result<u64, ProtocolError> {
    id.ok_or_else(|| ProtocolError::InvalidMessage("ack without packet id".into()))
}
