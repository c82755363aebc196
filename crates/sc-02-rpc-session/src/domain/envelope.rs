//! # Canonical Envelope Codec
//!
//! A request or response body is the positional 4-tuple
//! `[request_id, method, params, timestamp]`, never a keyed object, so that
//! hash-then-sign over the encoded bytes is reproducible by any peer.
//!
//! A full message wraps the body under `req` or `res` next to a `sig` list:
//!
//! ```text
//! {"req":[1700000000123,"get_config",{},1700000000123],"sig":["0x…"]}
//! ```

use super::error::FormatError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use shared_types::{Hash, Signature};

/// Wire body shared by requests and responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Correlation id.
    pub request_id: u64,
    /// Method name.
    pub method: String,
    /// Method-specific parameters or result.
    pub params: Value,
    /// Unix milliseconds.
    pub timestamp: u64,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(request_id: u64, method: impl Into<String>, params: Value, timestamp: u64) -> Self {
        Self {
            request_id,
            method: method.into(),
            params,
            timestamp,
        }
    }

    /// The positional JSON form.
    pub fn to_value(&self) -> Value {
        json!([self.request_id, self.method, self.params, self.timestamp])
    }

    /// Canonical bytes. These are what gets hashed and signed.
    pub fn encode(&self) -> Vec<u8> {
        self.to_value().to_string().into_bytes()
    }

    /// Keccak256 of the canonical bytes.
    pub fn signing_hash(&self) -> Hash {
        sc_01_signer::keccak256(&self.encode())
    }

    /// Parse from the positional JSON form.
    pub fn from_value(value: &Value) -> Result<Self, FormatError> {
        let items = match value.as_array() {
            Some(items) if items.len() == 4 => items,
            Some(items) => {
                return Err(FormatError::WrongShape(format!(
                    "array of {} elements",
                    items.len()
                )))
            }
            None => return Err(FormatError::WrongShape(json_kind(value).to_string())),
        };

        let request_id = items[0].as_u64().ok_or_else(|| FormatError::InvalidField {
            field: "request_id",
            reason: format!("expected non-negative integer, got {}", items[0]),
        })?;
        let method = items[1]
            .as_str()
            .ok_or_else(|| FormatError::InvalidField {
                field: "method",
                reason: format!("expected string, got {}", items[1]),
            })?
            .to_string();
        let timestamp = items[3].as_u64().ok_or_else(|| FormatError::InvalidField {
            field: "timestamp",
            reason: format!("expected non-negative integer, got {}", items[3]),
        })?;

        Ok(Self {
            request_id,
            method,
            params: items[2].clone(),
            timestamp,
        })
    }

    /// Parse canonical bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.request_id, &self.method, &self.params, self.timestamp).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Which side of an exchange a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Client to coordinator, wrapped under `req`.
    Request,
    /// Coordinator to client, wrapped under `res`.
    Response,
}

impl MessageKind {
    fn key(self) -> &'static str {
        match self {
            Self::Request => "req",
            Self::Response => "res",
        }
    }
}

/// Envelope plus zero or more signatures over its canonical encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcMessage {
    /// Request or response.
    pub kind: MessageKind,
    /// Body.
    pub envelope: Envelope,
    /// Signatures over `envelope.signing_hash()`.
    pub signatures: Vec<Signature>,
}

impl RpcMessage {
    /// An outgoing request.
    pub fn request(envelope: Envelope, signatures: Vec<Signature>) -> Self {
        Self {
            kind: MessageKind::Request,
            envelope,
            signatures,
        }
    }

    /// A response; used by peers and tests.
    pub fn response(envelope: Envelope, signatures: Vec<Signature>) -> Self {
        Self {
            kind: MessageKind::Response,
            envelope,
            signatures,
        }
    }

    /// Request id of the body.
    pub fn request_id(&self) -> u64 {
        self.envelope.request_id
    }

    /// Method of the body.
    pub fn method(&self) -> &str {
        &self.envelope.method
    }

    /// Wire JSON.
    pub fn to_value(&self) -> Value {
        let sigs: Vec<Value> = self
            .signatures
            .iter()
            .map(|s| Value::String(s.to_hex()))
            .collect();
        let mut obj = Map::new();
        obj.insert(self.kind.key().to_string(), self.envelope.to_value());
        obj.insert("sig".to_string(), Value::Array(sigs));
        Value::Object(obj)
    }

    /// Wire text frame.
    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }

    /// Parse a text frame.
    pub fn from_text(text: &str) -> Result<Self, FormatError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FormatError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse wire JSON.
    pub fn from_value(value: &Value) -> Result<Self, FormatError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FormatError::WrongShape(json_kind(value).to_string()))?;

        let (kind, body) = if let Some(body) = obj.get("res") {
            (MessageKind::Response, body)
        } else if let Some(body) = obj.get("req") {
            (MessageKind::Request, body)
        } else {
            return Err(FormatError::MissingBody);
        };

        let envelope = Envelope::from_value(body)?;

        let signatures = match obj.get("sig") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| FormatError::InvalidSignature(item.to_string()))?
                        .parse::<Signature>()
                        .map_err(|e| FormatError::InvalidSignature(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(FormatError::InvalidSignature(other.to_string())),
        };

        Ok(Self {
            kind,
            envelope,
            signatures,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
