//! Typed views over inbound `data` objects.
//!
//! Fields are optional at the serde level: presence rules belong to the state
//! machine, which reports a missing field as `INVALID_DATA` rather than failing
//! deserialization with an opaque message.

use serde::Deserialize;
use serde_json::Value;

/// `server:information`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InformationPayload {
    /// Message of the day; empty strings are ignored
    #[serde(default)]
    pub motd: Option<String>,
}

impl InformationPayload {
    /// MOTD, if the server supplied a non-empty one.
    pub fn motd(&self) -> Option<&str> {
        self.motd.as_deref().filter(|motd| !motd.is_empty())
    }
}

/// `server:set_protocol`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SetProtocolPayload {
    /// Chosen protocol identifier (string or number)
    #[serde(default)]
    pub protocol: Option<Value>,
}

impl SetProtocolPayload {
    /// Protocol identifier, if present and usable.
    pub fn protocol(&self) -> Option<&Value> {
        self.protocol.as_ref().filter(|value| identifier(value).is_some())
    }
}

/// `server:pre_authentication`, and `server:authenticate` when it starts
/// authentication
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreAuthenticationPayload {
    /// Server identity (string or number)
    #[serde(default)]
    pub id: Option<Value>,
}

impl PreAuthenticationPayload {
    /// Server identity rendered as a string.
    pub fn id(&self) -> Option<String> {
        self.id.as_ref().and_then(identifier)
    }
}

/// `server:authenticate` answering our challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChallengeResponsePayload {
    /// Challenge string echoed back
    #[serde(default)]
    pub string: Option<String>,
    /// Signature over the challenge
    #[serde(default)]
    pub signed: Option<String>,
}

/// `server:error`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    /// Error code
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub message: Option<String>,
}

/// Render an identifier value as a string.
///
/// Non-empty strings and numbers are identifiers; everything else is not.
pub fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identifiers_accept_strings_and_numbers() {
        assert_eq!(identifier(&json!("abc")), Some("abc".to_string()));
        assert_eq!(identifier(&json!(7)), Some("7".to_string()));
        assert_eq!(identifier(&json!("")), None);
        assert_eq!(identifier(&json!(null)), None);
        assert_eq!(identifier(&json!({"id": 1})), None);
    }

    #[test]
    fn empty_motd_is_ignored() {
        let payload: InformationPayload = serde_json::from_value(json!({"motd": ""})).unwrap();
        assert_eq!(payload.motd(), None);
        let payload: InformationPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(payload.motd(), None);
    }

    #[test]
    fn unusable_protocol_is_absent() {
        let payload: SetProtocolPayload =
            serde_json::from_value(json!({"protocol": false})).unwrap();
        assert_eq!(payload.protocol(), None);
        let payload: SetProtocolPayload = serde_json::from_value(json!({"protocol": 2})).unwrap();
        assert_eq!(payload.protocol(), Some(&json!(2)));
    }
}
