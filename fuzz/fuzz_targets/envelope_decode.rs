//! Random input fuzzer for envelope parsing and validation
//!
//! Arbitrary text must either decode or be classified. A frame that parses
//! must survive re-serialization unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use opensend_core::codec::{CodecConfig, EnvelopeCodec};
use opensend_crypto::SystemCrypto;
use opensend_proto::Envelope;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = Envelope::from_text(text) {
        let reencoded = envelope.to_text().unwrap();
        assert_eq!(Envelope::from_text(&reencoded).unwrap(), envelope);
    }

    for require_inbound_hash in [false, true] {
        let codec = EnvelopeCodec::new(SystemCrypto, CodecConfig {
            require_inbound_hash,
            ..CodecConfig::default()
        });
        if let Err(err) = codec.decode(text) {
            // Classification must not panic
            let _ = err.reply_kind();
        }
    }
});
