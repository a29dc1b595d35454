//! Scripted OpenSend server.
//!
//! The harness never runs a real server. Tests script one instead: this type
//! produces `server:*` frames with increasing timestamps (optionally stamped
//! with a valid or forged hash) and reads back what the client sent.

use opensend_crypto::{CryptoProvider, HashAlgorithm, SystemCrypto};
use opensend_proto::{Envelope, EnvelopeHash, Namespace, ProtocolError};
use serde_json::{Value, json};

/// Builds `server:*` frames for tests.
#[derive(Debug, Clone)]
pub struct ScriptedServer {
    hashed: bool,
    timestamp: u64,
}

impl ScriptedServer {
    /// A server that sends unhashed envelopes.
    pub fn new() -> Self {
        Self { hashed: false, timestamp: 0 }
    }

    /// A server that stamps every envelope with a SHA-384 hash.
    pub fn hashed() -> Self {
        Self { hashed: true, timestamp: 0 }
    }

    /// Build a frame for `server:{event}`.
    ///
    /// Non-object `data` is serialized as-is, which produces a frame the
    /// client must reject.
    pub fn frame(&mut self, event: &str, data: Value) -> String {
        self.timestamp += 1;
        let event = Namespace::Server.qualify(event);
        let Value::Object(data) = data else {
            return json!({"event": event, "data": data, "timestamp": self.timestamp}).to_string();
        };

        let mut envelope = Envelope::new(event, data, self.timestamp);
        if self.hashed {
            envelope.hash = digest(&envelope)
                .map(|value| EnvelopeHash::new(HashAlgorithm::Sha384.name(), value));
        }
        envelope.to_text().unwrap_or_default()
    }

    /// Build a frame whose hash does not match its contents.
    pub fn forged_frame(&mut self, event: &str, data: Value) -> String {
        self.timestamp += 1;
        let mut data = match data {
            Value::Object(data) => data,
            _ => serde_json::Map::new(),
        };
        let mut envelope =
            Envelope::new(Namespace::Server.qualify(event), data.clone(), self.timestamp);
        envelope.hash =
            digest(&envelope).map(|value| EnvelopeHash::new(HashAlgorithm::Sha384.name(), value));

        data.insert("forged".to_string(), Value::Bool(true));
        envelope.data = data;
        envelope.to_text().unwrap_or_default()
    }

    /// `server:connected`
    pub fn connected(&mut self) -> String {
        self.frame("connected", json!({}))
    }

    /// `server:information`, with or without a MOTD
    pub fn information(&mut self, motd: Option<&str>) -> String {
        match motd {
            Some(motd) => self.frame("information", json!({ "motd": motd })),
            None => self.frame("information", json!({})),
        }
    }

    /// `server:negotiate`
    pub fn negotiate(&mut self) -> String {
        self.frame("negotiate", json!({}))
    }

    /// `server:set_protocol`
    pub fn set_protocol(&mut self, protocol: Value) -> String {
        self.frame("set_protocol", json!({ "protocol": protocol }))
    }

    /// `server:pre_authentication` identifying the server as `id`
    pub fn pre_authentication(&mut self, id: Value) -> String {
        self.frame("pre_authentication", json!({ "id": id }))
    }

    /// `server:authenticate` identifying the server as `id`
    pub fn authenticate(&mut self, id: Value) -> String {
        self.frame("authenticate", json!({ "id": id }))
    }

    /// `server:authenticate` answering a challenge
    pub fn answer_challenge(&mut self, string: &str, signed: &str) -> String {
        self.frame("authenticate", json!({ "string": string, "signed": signed }))
    }

    /// `server:ping`
    pub fn ping(&mut self) -> String {
        self.frame("ping", json!({}))
    }

    /// `server:disconnect`
    pub fn disconnect(&mut self) -> String {
        self.frame("disconnect", json!({}))
    }

    /// `server:error`
    pub fn error(&mut self, code: &str, message: &str) -> String {
        self.frame("error", json!({ "error": code, "message": message }))
    }

    /// The four frames of a complete handshake, agreeing on protocol 1.
    pub fn handshake(&mut self) -> Vec<String> {
        vec![self.connected(), self.information(None), self.negotiate(), self.set_protocol(json!(1))]
    }
}

impl Default for ScriptedServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a frame the client sent, returning its bare event name and envelope.
pub fn read_client_frame(text: &str) -> Result<(String, Envelope), ProtocolError> {
    let envelope = Envelope::from_text(text)?;
    let event = envelope.event_name(Namespace::Client)?.to_string();
    Ok((event, envelope))
}

/// Whether a client envelope carries a hash matching its contents.
pub fn hash_is_valid(envelope: &Envelope) -> bool {
    let Some(hash) = &envelope.hash else {
        return false;
    };
    HashAlgorithm::from_name(&hash.algorithm).is_some()
        && digest(envelope).is_some_and(|computed| computed == hash.value)
}

fn digest(envelope: &Envelope) -> Option<String> {
    let input = envelope.digest_input().ok()?;
    Some(SystemCrypto.digest(HashAlgorithm::Sha384, &input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_server_namespaced_and_ordered() {
        let mut server = ScriptedServer::new();
        let first = Envelope::from_text(&server.connected()).unwrap();
        let second = Envelope::from_text(&server.ping()).unwrap();
        assert_eq!(first.event, "server:connected");
        assert!(first.hash.is_none());
        assert!(second.timestamp > first.timestamp);
    }

    #[test]
    fn hashed_frames_verify_and_forged_do_not() {
        let mut server = ScriptedServer::hashed();
        let good = Envelope::from_text(&server.information(Some("hi"))).unwrap();
        assert!(hash_is_valid(&good));

        let forged = Envelope::from_text(&server.forged_frame("information", json!({}))).unwrap();
        assert!(!hash_is_valid(&forged));
    }

    #[test]
    fn client_frames_are_read_back() {
        let text = r#"{"event":"client:connected","data":{},"timestamp":1}"#;
        let (event, envelope) = read_client_frame(text).unwrap();
        assert_eq!(event, "connected");
        assert!(!hash_is_valid(&envelope));

        assert!(read_client_frame(r#"{"event":"server:ping","data":{},"timestamp":1}"#).is_err());
    }
}
