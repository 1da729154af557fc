//! Application values that may carry raw bytes.
//!
//! JSON has no binary type, so Socket.IO lifts every byte buffer out of
//! the payload, sends it as its own frame, and leaves a placeholder object
//! behind:
//!
//! ```text
//! ["upload", <3 bytes>]  ──►  ["upload",{"_placeholder":true,"num":0}]  +  [0x01,0x02,0x03]
//! ```
//!
//! [`Data`] is the value tree with a `Bytes` leaf that makes this
//! possible. [`PlaceholderVisitor`] performs the lift, and
//! [`Data::from_json_with_attachments`] puts the bytes back.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::ProtocolError;

/// A JSON-like value tree that can also hold raw bytes.
///
/// Object entries keep their insertion order so the encoded JSON matches
/// what the caller wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Data>),
    Object(Vec<(String, Data)>),
}

impl Data {
    /// Wraps a byte buffer as a binary leaf.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Converts any `Serialize` value through `serde_json`.
    ///
    /// The result never contains `Bytes`: serde sees a `Vec<u8>` as a
    /// sequence of numbers. Use [`Data::bytes`] for binary leaves.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, ProtocolError> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(ProtocolError::Encode)
    }

    /// Rebuilds a value from decoded JSON, replacing every placeholder
    /// object with the attachment it points at.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] when a placeholder's `num`
    /// is out of range.
    pub fn from_json_with_attachments(
        value: Value,
        attachments: &[Vec<u8>],
    ) -> Result<Self, ProtocolError> {
        match value {
            Value::Object(map) => {
                if let Some(num) = placeholder_num(&map) {
                    let bytes = attachments.get(num).ok_or_else(|| {
                        ProtocolError::InvalidMessage(format!(
                            "placeholder {num} has no attachment ({} received)",
                            attachments.len()
                        ))
                    })?;
                    return Ok(Self::Bytes(bytes.clone()));
                }
                map.into_iter()
                    .map(|(key, value)| {
                        Ok((key, Self::from_json_with_attachments(value, attachments)?))
                    })
                    .collect::<Result<Vec<_>, ProtocolError>>()
                    .map(Self::Object)
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| Self::from_json_with_attachments(item, attachments))
                .collect::<Result<Vec<_>, ProtocolError>>()
                .map(Self::Array),
            other => Ok(Self::from(other)),
        }
    }

    /// Returns the string content of a `String` leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes of a `Bytes` leaf.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the number as `i64`, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Converts back to plain JSON. Returns `None` if the tree contains
    /// any `Bytes` leaf.
    pub fn to_json(&self) -> Option<Value> {
        Some(match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(_) => return None,
            Self::Array(items) => Value::Array(
                items.iter().map(Self::to_json).collect::<Option<_>>()?,
            ),
            Self::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.to_json()?)))
                    .collect::<Option<Map<_, _>>>()?,
            ),
        })
    }

    /// Returns `true` if any leaf of this tree is `Bytes`.
    pub fn has_binary(&self) -> bool {
        match self {
            Self::Bytes(_) => true,
            Self::Array(items) => items.iter().any(Self::has_binary),
            Self::Object(entries) => entries.iter().any(|(_, v)| v.has_binary()),
            _ => false,
        }
    }
}

fn placeholder_num(map: &Map<String, Value>) -> Option<usize> {
    if map.len() != 2 || map.get("_placeholder") != Some(&Value::Bool(true)) {
        return None;
    }
    map.get("num")?.as_u64().and_then(|n| usize::try_from(n).ok())
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            Value::Object(map) => Self::Object(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Data {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Data {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Data {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<Data>> for Data {
    fn from(items: Vec<Data>) -> Self {
        Self::Array(items)
    }
}

// ---------------------------------------------------------------------------
// PlaceholderVisitor
// ---------------------------------------------------------------------------

/// Walks a [`Data`] tree depth-first, left to right, swapping each `Bytes`
/// leaf for a numbered placeholder and collecting the bytes in the same
/// order.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderVisitor {
    attachments: Vec<Vec<u8>>,
}

impl PlaceholderVisitor {
    pub(crate) fn visit(&mut self, data: Data) -> Value {
        match data {
            Data::Null => Value::Null,
            Data::Bool(b) => Value::Bool(b),
            Data::Number(n) => Value::Number(n),
            Data::String(s) => Value::String(s),
            Data::Bytes(bytes) => {
                let num = self.attachments.len();
                self.attachments.push(bytes);
                let mut placeholder = Map::with_capacity(2);
                placeholder.insert("_placeholder".into(), Value::Bool(true));
                placeholder.insert("num".into(), Value::from(num));
                Value::Object(placeholder)
            }
            Data::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.visit(item)).collect())
            }
            Data::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, self.visit(v)))
                    .collect(),
            ),
        }
    }

    pub(crate) fn into_attachments(self) -> Vec<Vec<u8>> {
        self.attachments
    }
}
