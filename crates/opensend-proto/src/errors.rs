//! Error types for the OpenSend protocol.
//!
//! Two different things live here. [`ErrorKind`] is the closed taxonomy we
//! report *to the peer* inside a `client:error` envelope. [`ProtocolError`] is
//! the local, structured reason a piece of text failed to become an envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kinds reported to the server in `client:error` envelopes.
///
/// The set is closed: every rejected inbound frame maps to exactly one kind,
/// and each kind carries a fixed human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Envelope missing required fields or otherwise malformed
    InvalidData,
    /// Integrity digest did not match the envelope contents
    InvalidChecksum,
    /// Event arrived while the connection was in the wrong state
    Violation,
    /// Anything not otherwise classified
    Unknown,
}

impl ErrorKind {
    /// Every error kind, in wire order.
    pub const ALL: [ErrorKind; 4] =
        [Self::InvalidData, Self::InvalidChecksum, Self::Violation, Self::Unknown];

    /// Wire code placed in the `error` field.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidData => "INVALID_DATA",
            Self::InvalidChecksum => "INVALID_CHECKSUM",
            Self::Violation => "VIOLATION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable text placed in the `message` field.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidData => "I have no clue what you just sent me.",
            Self::InvalidChecksum => {
                "You sent me something, but it seems to be tampered-with/damaged. I'm ignoring it."
            },
            Self::Violation => "You've done something wrong.",
            Self::Unknown => "Something has gone wrong.",
        }
    }

    /// Parse a wire code back into a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised while turning text into an envelope (or back).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Text is not valid JSON at all
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Valid JSON, but not an object
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// A required top-level field is absent (or null)
    #[error("envelope is missing required field `{0}`")]
    MissingField(&'static str),

    /// A top-level field has the wrong JSON type
    #[error("envelope field `{field}` must be {expected}")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
        /// Description of the accepted type
        expected: &'static str,
    },

    /// Event name lacks the namespace prefix for this direction
    #[error("event `{event}` is outside the `{expected}` namespace")]
    WrongNamespace {
        /// Event name as received
        event: String,
        /// Namespace the event should have carried
        expected: crate::Namespace,
    },

    /// The `data` object does not fit the event's payload shape
    #[error("invalid payload for `{event}`: {reason}")]
    InvalidPayload {
        /// Event whose payload was rejected
        event: String,
        /// Why the payload was rejected
        reason: String,
    },

    /// Failed to serialize an envelope
    #[error("failed to encode JSON: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Error kind to report to the peer, if any.
    ///
    /// Text that is not JSON cannot be answered: there is no request to
    /// respond about, so it is only logged locally.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Malformed(_) | Self::Encode(_) => None,
            Self::NotAnObject
            | Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::WrongNamespace { .. }
            | Self::InvalidPayload { .. } => Some(ErrorKind::InvalidData),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Encode(err.to_string())
    }
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("NOPE"), None);
    }

    #[test]
    fn serde_uses_wire_codes() {
        let json = serde_json::to_string(&ErrorKind::InvalidChecksum).unwrap();
        assert_eq!(json, "\"INVALID_CHECKSUM\"");
    }

    #[test]
    fn unparseable_text_gets_no_reply() {
        assert_eq!(ProtocolError::Malformed("eof".to_string()).error_kind(), None);
        assert_eq!(
            ProtocolError::MissingField("timestamp").error_kind(),
            Some(ErrorKind::InvalidData)
        );
        assert_eq!(ProtocolError::NotAnObject.error_kind(), Some(ErrorKind::InvalidData));
    }
}
