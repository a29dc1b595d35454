//! Feeds arbitrary frames to a connection in every state
//!
//! `handle_text` must never panic, and every reply it produces must be
//! encodable.

#![no_main]

use std::time::Instant;

use libfuzzer_sys::fuzz_target;
use opensend_core::{
    codec::{CodecConfig, EnvelopeCodec},
    connection::{Connection, ConnectionAction, ConnectionConfig},
    identity::{ApplicationIdentity, ProtocolWindow},
};
use opensend_crypto::SystemCrypto;

const HANDSHAKE: &[&str] = &[
    r#"{"event":"server:connected","data":{},"timestamp":1}"#,
    r#"{"event":"server:information","data":{},"timestamp":2}"#,
    r#"{"event":"server:negotiate","data":{},"timestamp":3}"#,
    r#"{"event":"server:set_protocol","data":{"protocol":1},"timestamp":4}"#,
];

fuzz_target!(|data: &[u8]| {
    let Some((&depth, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };

    let now = Instant::now();
    let identity = ApplicationIdentity::new("fuzz", "0.0.0", ProtocolWindow::default());
    let codec = EnvelopeCodec::new(SystemCrypto, CodecConfig::default());
    let mut conn = Connection::new(identity, codec, ConnectionConfig::default());
    conn.connect(now).unwrap();

    for frame in HANDSHAKE.iter().take(usize::from(depth) % (HANDSHAKE.len() + 1)) {
        conn.handle_text(frame, now);
    }

    for action in conn.handle_text(text, now) {
        if let ConnectionAction::Send(message) = action {
            conn.encode(&message, 0).unwrap();
        }
    }
});
