//! Engine.IO payload codecs for the HTTP long-polling transport.
//!
//! Polling has no message boundaries: one HTTP body may carry several
//! packets. The two protocol generations frame them differently:
//!
//! ```text
//! v3 text   : 6:42["a"]2:40            (length-prefixed)
//! v3 binary : 00 06 ff "42[..]" 01 04 ff 04 <3 bytes>   (type, length digits, 0xff, payload)
//! v4 text   : 42["a"] \x1e 40 \x1e bAQID  (record-separator delimited)
//! ```
//!
//! Binary packets inside a text body are written as `b` + base64.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use socketforge_transport::ProtocolMessage;

/// Engine.IO v4 record separator between packets in a polling body.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Engine.IO "message" packet type, written in front of binary packets.
pub(crate) const BINARY_MESSAGE_MARKER: u8 = 4;

/// Length-terminator in the v3 binary payload framing.
const BINARY_LENGTH_TERMINATOR: u8 = 255;

/// Multiplexes several protocol messages into one polling body, and back.
pub trait PayloadCodec: Send + Sync {
    /// Encodes `messages` as a single text body.
    fn encode(&self, messages: &[ProtocolMessage]) -> String;

    /// Splits a text body into its messages.
    fn decode(&self, text: &str) -> Vec<ProtocolMessage>;

    /// Encodes `messages` as a single binary body. Empty when the protocol
    /// generation never posts binary bodies.
    fn encode_bytes(&self, messages: &[ProtocolMessage]) -> Vec<u8>;

    /// Splits a binary body into its messages.
    fn decode_bytes(&self, bytes: &[u8]) -> Vec<ProtocolMessage>;
}

fn base64_entry(bytes: &[u8]) -> String {
    format!("b{}", BASE64.encode(bytes))
}

// ---------------------------------------------------------------------------
// Engine.IO v3
// ---------------------------------------------------------------------------

/// Length-prefixed framing used by Engine.IO v3 (Socket.IO v2).
///
/// Text lengths are counted in UTF-16 code units, the unit JavaScript
/// peers use for `string.length`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineIo3PayloadCodec;

impl PayloadCodec for EngineIo3PayloadCodec {
    fn encode(&self, messages: &[ProtocolMessage]) -> String {
        let mut body = String::new();
        for message in messages {
            let entry = match message {
                ProtocolMessage::Text(text) => text.clone(),
                ProtocolMessage::Bytes(bytes) => base64_entry(bytes),
            };
            // Writing to a String cannot fail.
            let _ = write!(body, "{}:{}", entry.encode_utf16().count(), entry);
        }
        body
    }

    fn decode(&self, text: &str) -> Vec<ProtocolMessage> {
        let mut messages = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            let Some(colon) = rest.find(':') else {
                break;
            };
            let Ok(length) = rest[..colon].parse::<usize>() else {
                tracing::debug!(prefix = &rest[..colon], "bad v3 payload length");
                break;
            };
            let body = &rest[colon + 1..];
            let Some(end) = utf16_prefix_len(body, length) else {
                tracing::debug!(length, "truncated v3 payload entry");
                break;
            };
            messages.push(ProtocolMessage::Text(body[..end].to_owned()));
            rest = &body[end..];
        }

        messages
    }

    fn encode_bytes(&self, messages: &[ProtocolMessage]) -> Vec<u8> {
        let mut body = Vec::new();
        for message in messages {
            match message {
                ProtocolMessage::Text(text) => {
                    body.push(0);
                    push_length_digits(&mut body, text.len());
                    body.push(BINARY_LENGTH_TERMINATOR);
                    body.extend_from_slice(text.as_bytes());
                }
                ProtocolMessage::Bytes(bytes) => {
                    body.push(1);
                    push_length_digits(&mut body, bytes.len() + 1);
                    body.push(BINARY_LENGTH_TERMINATOR);
                    body.push(BINARY_MESSAGE_MARKER);
                    body.extend_from_slice(bytes);
                }
            }
        }
        body
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Vec<ProtocolMessage> {
        let mut messages = Vec::new();
        let mut cursor = 0;

        while cursor < bytes.len() {
            let is_binary = bytes[cursor] != 0;
            cursor += 1;

            let mut length: usize = 0;
            loop {
                let Some(&digit) = bytes.get(cursor) else {
                    tracing::debug!("v3 binary payload ended inside a length");
                    return messages;
                };
                cursor += 1;
                if digit == BINARY_LENGTH_TERMINATOR {
                    break;
                }
                let next = (digit <= 9)
                    .then(|| length.checked_mul(10)?.checked_add(usize::from(digit)))
                    .flatten();
                let Some(next) = next else {
                    tracing::debug!(digit, "bad digit in v3 binary payload length");
                    return messages;
                };
                length = next;
            }

            let Some(payload) = cursor
                .checked_add(length)
                .and_then(|end| bytes.get(cursor..end))
            else {
                tracing::debug!(length, "truncated v3 binary payload entry");
                return messages;
            };
            cursor += length;

            if is_binary {
                // Skip the Engine.IO message-type marker.
                let attachment = payload.get(1..).unwrap_or_default();
                messages.push(ProtocolMessage::Bytes(attachment.to_vec()));
            } else {
                match std::str::from_utf8(payload) {
                    Ok(text) => messages.push(ProtocolMessage::Text(text.to_owned())),
                    Err(e) => tracing::debug!(error = %e, "non-UTF-8 text entry dropped"),
                }
            }
        }

        messages
    }
}

/// Returns the byte offset at which `text` has consumed exactly `units`
/// UTF-16 code units, or `None` if it's shorter or the boundary splits a
/// surrogate pair.
fn utf16_prefix_len(text: &str, units: usize) -> Option<usize> {
    let mut seen = 0;
    for (offset, ch) in text.char_indices() {
        if seen == units {
            return Some(offset);
        }
        seen += ch.len_utf16();
        if seen > units {
            return None;
        }
    }
    (seen == units).then_some(text.len())
}

/// Writes `length` as one byte per decimal digit, each holding the digit's
/// value (not its ASCII code).
fn push_length_digits(body: &mut Vec<u8>, length: usize) {
    body.extend(length.to_string().bytes().map(|ascii| ascii - b'0'));
}

// ---------------------------------------------------------------------------
// Engine.IO v4
// ---------------------------------------------------------------------------

/// Record-separator framing used by Engine.IO v4 (Socket.IO v4/v5).
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineIo4PayloadCodec;

impl PayloadCodec for EngineIo4PayloadCodec {
    fn encode(&self, messages: &[ProtocolMessage]) -> String {
        let mut body = String::new();
        for (index, message) in messages.iter().enumerate() {
            if index > 0 {
                body.push(RECORD_SEPARATOR);
            }
            match message {
                ProtocolMessage::Text(text) => body.push_str(text),
                ProtocolMessage::Bytes(bytes) => body.push_str(&base64_entry(bytes)),
            }
        }
        body
    }

    fn decode(&self, text: &str) -> Vec<ProtocolMessage> {
        text.split(RECORD_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| match segment.strip_prefix('b') {
                Some(encoded) => match BASE64.decode(encoded) {
                    Ok(bytes) => Some(ProtocolMessage::Bytes(bytes)),
                    Err(e) => {
                        tracing::debug!(error = %e, "bad base64 entry dropped");
                        None
                    }
                },
                None => Some(ProtocolMessage::Text(segment.to_owned())),
            })
            .collect()
    }

    fn encode_bytes(&self, _messages: &[ProtocolMessage]) -> Vec<u8> {
        Vec::new()
    }

    fn decode_bytes(&self, _bytes: &[u8]) -> Vec<ProtocolMessage> {
        Vec::new()
    }
}
