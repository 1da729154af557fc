//! Peels the prefix layers off raw packet text.
//!
//! Three grammars are handled here, outermost first:
//!
//! ```text
//! raw text      : <type prefix> <body>
//! event body    : [/namespace,] [id digits] <json>
//! binary body   : <attachment count> - <event body>
//! ```
//!
//! Nothing in this module parses JSON. It only slices strings, so a
//! malformed body surfaces later, when the typed packet is built.

use crate::MessageType;

/// Outcome of stripping the type prefix from raw packet text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecapsulationResult {
    /// `false` when the prefix was missing or unrecognized.
    pub success: bool,
    /// The recognized type, `None` on failure.
    pub message_type: Option<MessageType>,
    /// Everything after the consumed prefix. May be empty.
    pub data: String,
}

impl DecapsulationResult {
    fn failed() -> Self {
        Self {
            success: false,
            message_type: None,
            data: String::new(),
        }
    }

    fn ok(message_type: MessageType, data: &str) -> Self {
        Self {
            success: true,
            message_type: Some(message_type),
            data: data.to_owned(),
        }
    }
}

/// Parsed body of an event or ack packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResult {
    /// The `/`-prefixed namespace, when one was present.
    pub namespace: Option<String>,
    /// The packet id, when one was present.
    pub id: Option<u64>,
    /// The remaining body, normally a JSON array literal.
    pub data: String,
}

/// Parsed body of a binary event or binary ack packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryEventMessageResult {
    /// How many binary frames follow this packet.
    pub attachment_count: usize,
    /// The `/`-prefixed namespace, when one was present.
    pub namespace: Option<String>,
    /// The packet id, when one was present.
    pub id: Option<u64>,
    /// The remaining body, normally a JSON array literal.
    pub data: String,
}

/// Identifies the packet type from its leading character(s).
pub fn decapsulate_raw_text(text: &str) -> DecapsulationResult {
    let mut chars = text.chars();
    let message_type = match chars.next() {
        Some('0') => MessageType::Opened,
        Some('2') => MessageType::Ping,
        Some('3') => MessageType::Pong,
        Some('4') => {
            match chars.next().and_then(MessageType::from_socket_io_digit) {
                Some(ty) => ty,
                None => return DecapsulationResult::failed(),
            }
        }
        _ => return DecapsulationResult::failed(),
    };

    // All prefix characters are ASCII, so byte length == char count.
    let prefix_len = message_type.prefix().len();
    DecapsulationResult::ok(message_type, &text[prefix_len..])
}

/// Splits an event/ack body into namespace, packet id and JSON data.
pub fn decapsulate_event_message(text: &str) -> MessageResult {
    let (namespace, rest) = split_namespace(text);
    let (id, data) = split_id(rest);
    MessageResult {
        namespace: namespace.map(str::to_owned),
        id,
        data: data.to_owned(),
    }
}

/// Splits a binary event/ack body. The `<count>-` header is mandatory;
/// returns `None` when it's missing.
pub fn decapsulate_binary_event_message(
    text: &str,
) -> Option<BinaryEventMessageResult> {
    let digits = leading_digits(text);
    if digits == 0 || text.as_bytes().get(digits) != Some(&b'-') {
        return None;
    }
    // A count too long for usize is still a count; callers cap it.
    let attachment_count = text[..digits].parse().unwrap_or(usize::MAX);

    let body = decapsulate_event_message(&text[digits + 1..]);
    Some(BinaryEventMessageResult {
        attachment_count,
        namespace: body.namespace,
        id: body.id,
        data: body.data,
    })
}

/// Returns the namespace (leading `/` included, comma excluded) and the
/// text after the comma. A namespace with no comma consumes everything.
pub(crate) fn split_namespace(text: &str) -> (Option<&str>, &str) {
    if !text.starts_with('/') {
        return (None, text);
    }
    match text.find(',') {
        Some(comma) => (Some(&text[..comma]), &text[comma + 1..]),
        None => (Some(text), ""),
    }
}

fn split_id(text: &str) -> (Option<u64>, &str) {
    let digits = leading_digits(text);
    if digits == 0 {
        return (None, text);
    }
    // An id too long for u64 can't be a real packet id; leave it in data
    // so the JSON parse rejects the packet instead.
    match text[..digits].parse() {
        Ok(id) => (Some(id), &text[digits..]),
        Err(_) => (None, text),
    }
}

fn leading_digits(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}
