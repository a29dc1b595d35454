//! Envelope stamping and validation.
//!
//! Outgoing messages are namespaced, timestamped and then hashed: the digest
//! covers `{event, data, timestamp}` and is attached as `hash` only after it
//! has been computed. Incoming text is parsed, checked against the `server:`
//! namespace and, when it carries a hash, re-digested over the frame as
//! received (minus `hash`) and compared.

use opensend_crypto::{CryptoProvider, HashAlgorithm};
use opensend_proto::{
    ClientMessage, Envelope, EnvelopeHash, ErrorKind, Namespace, ProtocolError, ServerEvent,
};
use thiserror::Error;

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Algorithm used to stamp outgoing envelopes
    pub algorithm: HashAlgorithm,
    /// Reject inbound envelopes that carry no hash
    pub require_inbound_hash: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { algorithm: HashAlgorithm::Sha384, require_inbound_hash: false }
    }
}

/// Reasons an inbound frame failed to decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Framing, field or namespace problem
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Hash names an algorithm we cannot compute
    #[error("unsupported hash algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    /// Hash absent while the codec requires one
    #[error("envelope carries no integrity hash")]
    MissingHash,

    /// Recomputed digest differs from the attached one
    #[error("digest mismatch: envelope claims {claimed}, computed {computed}")]
    ChecksumMismatch {
        /// Digest carried by the envelope
        claimed: String,
        /// Digest computed locally
        computed: String,
    },
}

impl DecodeError {
    /// Error kind to report to the peer; `None` means log and drop.
    pub fn reply_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Protocol(err) => err.error_kind(),
            Self::UnsupportedAlgorithm(_) | Self::MissingHash | Self::ChecksumMismatch { .. } => {
                Some(ErrorKind::InvalidChecksum)
            },
        }
    }
}

/// A validated inbound envelope and its classified event.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Event with the `server:` namespace stripped
    pub event: ServerEvent,
    /// The full envelope, including `data`
    pub envelope: Envelope,
}

/// Stamps outgoing messages and validates incoming ones.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec<C> {
    crypto: C,
    config: CodecConfig,
}

impl<C: CryptoProvider> EnvelopeCodec<C> {
    /// Create a codec backed by `crypto`.
    pub fn new(crypto: C, config: CodecConfig) -> Self {
        Self { crypto, config }
    }

    /// The crypto provider.
    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    /// The codec configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Build a complete `client:` envelope for `message`.
    pub fn stamp(&self, message: &ClientMessage, timestamp: u64) -> Result<Envelope, ProtocolError> {
        let mut envelope =
            Envelope::new(Namespace::Client.qualify(message.event()), message.data(), timestamp);
        let digest = self.crypto.digest(self.config.algorithm, &envelope.digest_input()?);
        envelope.hash = Some(EnvelopeHash::new(self.config.algorithm.name(), digest));
        Ok(envelope)
    }

    /// Stamp `message` and serialize it to wire text.
    pub fn encode(&self, message: &ClientMessage, timestamp: u64) -> Result<String, ProtocolError> {
        self.stamp(message, timestamp)?.to_text()
    }

    /// Parse and validate an inbound frame.
    ///
    /// # Errors
    ///
    /// See [`DecodeError`]; [`DecodeError::reply_kind`] says whether the peer
    /// should be told.
    pub fn decode(&self, text: &str) -> Result<Inbound, DecodeError> {
        let envelope = Envelope::from_text(text)?;
        let event = ServerEvent::from_name(envelope.event_name(Namespace::Server)?);
        self.verify(&envelope, text)?;
        Ok(Inbound { event, envelope })
    }

    /// Check the envelope's hash against the frame it was parsed from.
    pub fn verify(&self, envelope: &Envelope, text: &str) -> Result<(), DecodeError> {
        let Some(hash) = &envelope.hash else {
            return if self.config.require_inbound_hash {
                Err(DecodeError::MissingHash)
            } else {
                Ok(())
            };
        };

        let algorithm = HashAlgorithm::from_name(&hash.algorithm)
            .ok_or_else(|| DecodeError::UnsupportedAlgorithm(hash.algorithm.clone()))?;
        let computed = self.crypto.digest(algorithm, &Envelope::received_digest_input(text)?);

        if computed.eq_ignore_ascii_case(&hash.value) {
            Ok(())
        } else {
            Err(DecodeError::ChecksumMismatch { claimed: hash.value.clone(), computed })
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use opensend_crypto::SystemCrypto;
    use serde_json::json;

    use super::*;

    fn codec() -> EnvelopeCodec<SystemCrypto> {
        EnvelopeCodec::new(SystemCrypto, CodecConfig::default())
    }

    #[test]
    fn stamped_envelope_verifies() {
        let codec = codec();
        let envelope = codec.stamp(&ClientMessage::Connected, 1_700_000_000_000).unwrap();
        assert_eq!(envelope.event, "client:connected");

        let hash = envelope.hash.clone().unwrap();
        assert_eq!(hash.algorithm, "sha384");

        let mut unhashed = envelope.clone();
        unhashed.hash = None;
        let recomputed =
            SystemCrypto.digest(HashAlgorithm::Sha384, &unhashed.digest_input().unwrap());
        assert_eq!(recomputed, hash.value);
    }

    #[test]
    fn connected_wire_text() {
        let text = codec().encode(&ClientMessage::Connected, 1_700_000_000_000).unwrap();
        assert_snapshot!(
            text,
            @r#"{"event":"client:connected","data":{"message":"I can hear you!"},"timestamp":1700000000000,"hash":{"algorithm":"sha384","value":"a193aa5f11df95128f07735d7fddbc82911acf22bb2be98ce9cd6f2513ed5cb45c20f99a2cd350fa4860d6d5b163b1e0"}}"#
        );
    }

    #[test]
    fn decode_accepts_unhashed_by_default() {
        let inbound =
            codec().decode(r#"{"event":"server:connected","data":{},"timestamp":5}"#).unwrap();
        assert_eq!(inbound.event, ServerEvent::Connected);
    }

    #[test]
    fn decode_requires_hash_when_configured() {
        let codec = EnvelopeCodec::new(
            SystemCrypto,
            CodecConfig { require_inbound_hash: true, ..CodecConfig::default() },
        );
        let err = codec.decode(r#"{"event":"server:connected","data":{},"timestamp":5}"#);
        assert_eq!(err, Err(DecodeError::MissingHash));
        assert_eq!(DecodeError::MissingHash.reply_kind(), Some(ErrorKind::InvalidChecksum));
    }

    #[test]
    fn tampered_envelope_is_rejected() {
        let codec = codec();
        let mut envelope = Envelope::new(
            "server:information",
            match json!({"motd": "Welcome"}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            },
            9,
        );
        let digest = SystemCrypto.digest(HashAlgorithm::Sha384, &envelope.digest_input().unwrap());
        envelope.hash = Some(EnvelopeHash::new("sha384", digest));
        assert!(codec.decode(&envelope.to_text().unwrap()).is_ok());

        envelope.data.insert("motd".to_string(), json!("Pwned"));
        let err = codec.decode(&envelope.to_text().unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch { .. }));
        assert_eq!(err.reply_kind(), Some(ErrorKind::InvalidChecksum));
    }

    /// Attach a sha384 hash of `body` (a compact JSON object) as its last member.
    fn hashed(body: &str) -> String {
        let digest = SystemCrypto.digest(HashAlgorithm::Sha384, body.as_bytes());
        let open = body.strip_suffix('}').unwrap();
        format!(r#"{open},"hash":{{"algorithm":"sha384","value":"{digest}"}}}}"#)
    }

    #[test]
    fn peer_key_order_is_honored() {
        let codec = codec();
        let text = hashed(r#"{"timestamp":5,"event":"server:ping","data":{}}"#);
        let inbound = codec.decode(&text).unwrap();
        assert_eq!(inbound.event, ServerEvent::Ping);

        // The same members in our own order no longer match the peer's digest
        let reordered = text.replacen(
            r#""timestamp":5,"event":"server:ping""#,
            r#""event":"server:ping","timestamp":5"#,
            1,
        );
        assert!(matches!(codec.decode(&reordered), Err(DecodeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn peer_number_formatting_is_honored() {
        let text = hashed(
            r#"{"event":"server:information","data":{"n":123456789012345680000,"motd":"hi"},"timestamp":5}"#,
        );
        assert_eq!(codec().decode(&text).unwrap().event, ServerEvent::Information);
    }

    #[test]
    fn hash_position_does_not_matter() {
        let body = r#"{"event":"server:ping","data":{},"timestamp":9}"#;
        let digest = SystemCrypto.digest(HashAlgorithm::Sha384, body.as_bytes());
        let text = format!(
            r#"{{"hash":{{"algorithm":"sha384","value":"{digest}"}},"event":"server:ping","data":{{}},"timestamp":9}}"#
        );
        assert!(codec().decode(&text).is_ok());
    }

    #[test]
    fn unknown_algorithm_is_a_checksum_failure() {
        let text = r#"{"event":"server:ping","data":{},"timestamp":1,"hash":{"algorithm":"md5","value":"00"}}"#;
        let err = codec().decode(text).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedAlgorithm("md5".to_string()));
        assert_eq!(err.reply_kind(), Some(ErrorKind::InvalidChecksum));
    }

    #[test]
    fn client_namespace_is_rejected_inbound() {
        let err =
            codec().decode(r#"{"event":"client:connected","data":{},"timestamp":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Protocol(ProtocolError::WrongNamespace { .. })));
        assert_eq!(err.reply_kind(), Some(ErrorKind::InvalidData));
    }

    #[test]
    fn garbage_gets_no_reply() {
        let err = codec().decode("not json at all").unwrap_err();
        assert_eq!(err.reply_kind(), None);
    }
}
