//! Envelope framing.
//!
//! ```text
//! {
//!   "event": "client:connected",          namespaced event name
//!   "data": { "message": "..." },         event-specific object
//!   "timestamp": 1700000000000,           epoch milliseconds
//!   "hash": { "algorithm": "sha384",      digest over the three fields
//!             "value": "9f0c..." }        above, hash excluded
//! }
//! ```
//!
//! Outgoing envelopes are digested over the compact JSON of
//! `{event, data, timestamp}` in that key order. Received envelopes are
//! digested over the frame as it arrived: every top-level member except
//! `hash`, in arrival order, each value exactly as the peer wrote it. Nothing
//! is re-serialized on the inbound side, so key order and number formatting
//! chosen by the peer survive.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{DeserializeOwned, MapAccess, Visitor},
};
use serde_json::{Map, Value, value::RawValue};

use crate::errors::{ProtocolError, Result};

/// Direction namespace of an event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Events we send (`client:*`)
    Client,
    /// Events we receive (`server:*`)
    Server,
}

impl Namespace {
    /// Prefix including the separator, e.g. `"client:"`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Client => "client:",
            Self::Server => "server:",
        }
    }

    /// Qualify a bare event name with this namespace.
    pub fn qualify(self, name: &str) -> String {
        format!("{}{name}", self.prefix())
    }

    /// Strip this namespace from a qualified event name.
    ///
    /// Returns `None` when the event belongs to another namespace or the bare
    /// name would be empty.
    pub fn strip(self, event: &str) -> Option<&str> {
        event.strip_prefix(self.prefix()).filter(|name| !name.is_empty())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Integrity metadata attached to an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHash {
    /// Digest algorithm name (e.g. `"sha384"`)
    pub algorithm: String,
    /// Lowercase hex digest
    pub value: String,
}

impl EnvelopeHash {
    /// Create hash metadata.
    pub fn new(algorithm: impl Into<String>, value: impl Into<String>) -> Self {
        Self { algorithm: algorithm.into(), value: value.into() }
    }
}

/// The complete wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Namespaced event name
    pub event: String,
    /// Event-specific payload
    pub data: Map<String, Value>,
    /// Epoch milliseconds
    pub timestamp: u64,
    /// Integrity hash; absent only before stamping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<EnvelopeHash>,
}

/// Borrowed view of an envelope without its hash, used as the digest input.
#[derive(Serialize)]
struct DigestInput<'a> {
    event: &'a str,
    data: &'a Map<String, Value>,
    timestamp: u64,
}

impl Envelope {
    /// Create an unstamped envelope.
    pub fn new(event: impl Into<String>, data: Map<String, Value>, timestamp: u64) -> Self {
        Self { event: event.into(), data, timestamp, hash: None }
    }

    /// Bytes the integrity digest of an outgoing envelope is computed over.
    ///
    /// Never includes the `hash` field, whether or not it is set.
    pub fn digest_input(&self) -> Result<Vec<u8>> {
        let input = DigestInput { event: &self.event, data: &self.data, timestamp: self.timestamp };
        Ok(serde_json::to_vec(&input)?)
    }

    /// Bytes the integrity digest of a received frame is computed over.
    ///
    /// `text` is rebuilt as a compact object holding every top-level member
    /// except `hash`, in arrival order, with each key re-escaped and each
    /// value copied verbatim.
    ///
    /// # Errors
    ///
    /// `Malformed` if the text is not a JSON object.
    pub fn received_digest_input(text: &str) -> Result<Vec<u8>> {
        let RawMembers(members) =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let mut input = Vec::with_capacity(text.len());
        input.push(b'{');
        for (index, (key, value)) in members.iter().filter(|(key, _)| key != "hash").enumerate() {
            if index > 0 {
                input.push(b',');
            }
            serde_json::to_writer(&mut input, key)?;
            input.push(b':');
            input.extend_from_slice(value.get().as_bytes());
        }
        input.push(b'}');
        Ok(input)
    }

    /// Serialize to wire text.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse wire text, validating the required top-level fields.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the text is not JSON
    /// - `NotAnObject` if the JSON is not an object
    /// - `MissingField` if `event`, `data` or `timestamp` is absent or null
    /// - `InvalidField` if one of them (or `hash`) has the wrong type
    pub fn from_text(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let event = match take(&mut object, "event")? {
            Value::String(event) => event,
            _ => return Err(ProtocolError::InvalidField { field: "event", expected: "a string" }),
        };

        let data = match take(&mut object, "data")? {
            Value::Object(data) => data,
            _ => return Err(ProtocolError::InvalidField { field: "data", expected: "an object" }),
        };

        let timestamp = take(&mut object, "timestamp")?.as_u64().ok_or(
            ProtocolError::InvalidField { field: "timestamp", expected: "a non-negative integer" },
        )?;

        let hash = match object.remove("hash") {
            None | Some(Value::Null) => None,
            Some(hash) => Some(serde_json::from_value(hash).map_err(|_| {
                ProtocolError::InvalidField {
                    field: "hash",
                    expected: "an object with `algorithm` and `value` strings",
                }
            })?),
        };

        Ok(Self { event, data, timestamp, hash })
    }

    /// Bare event name, checked against the expected namespace.
    pub fn event_name(&self, namespace: Namespace) -> Result<&str> {
        namespace
            .strip(&self.event)
            .ok_or_else(|| ProtocolError::WrongNamespace { event: self.event.clone(), expected: namespace })
    }

    /// Deserialize `data` into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|e| {
            ProtocolError::InvalidPayload { event: self.event.clone(), reason: e.to_string() }
        })
    }
}

/// Top-level members of a JSON object in arrival order, values unparsed.
struct RawMembers(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawMembers {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = RawMembers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<RawMembers, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut members = Vec::with_capacity(map.size_hint().unwrap_or(4));
                while let Some(member) = map.next_entry::<String, Box<RawValue>>()? {
                    members.push(member);
                }
                Ok(RawMembers(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}

fn take(object: &mut Map<String, Value>, field: &'static str) -> Result<Value> {
    match object.remove(field) {
        None | Some(Value::Null) => Err(ProtocolError::MissingField(field)),
        Some(value) => Ok(value),
    }
}
