//! Property-based tests for the Connection state machine.
//!
//! These tests use proptest to verify invariants hold for all possible inputs:
//! - Every (state, event) pair outside the transition table is a violation
//! - Rejected events never change state
//! - Timeouts occur at expected times
//! - No panics on arbitrary inputs

use std::time::{Duration, Instant};

use opensend_core::{
    codec::{CodecConfig, EnvelopeCodec},
    connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState},
    identity::{ApplicationIdentity, ProtocolWindow},
};
use opensend_harness::{ScriptedServer, SimCrypto};
use opensend_proto::{ClientMessage, ErrorKind, ServerEvent};
use proptest::prelude::*;
use serde_json::{Value, json};

fn new_connection(config: ConnectionConfig) -> Connection<SimCrypto> {
    let identity = ApplicationIdentity::new("opensend-test", "1.0.0", ProtocolWindow::default());
    Connection::new(identity, EnvelopeCodec::new(SimCrypto::new(), CodecConfig::default()), config)
}

/// Drive a fresh connection into `target` through legal moves only.
fn connection_in(target: ConnectionState, now: Instant) -> Connection<SimCrypto> {
    use ConnectionState as S;

    let mut conn = new_connection(ConnectionConfig::default());
    let mut server = ScriptedServer::new();

    let path: &[S] = match target {
        S::Inactive => &[],
        S::Connecting => &[S::Connecting],
        S::Information => &[S::Connecting, S::Information],
        S::Negotiate => &[S::Connecting, S::Information, S::Negotiate],
        S::SetProtocol => &[S::Connecting, S::Information, S::Negotiate, S::SetProtocol],
        S::ReadyToAuthenticate
        | S::ServerPreAuthentication
        | S::ServerAuthenticate
        | S::Authenticated
        | S::Disconnected => {
            &[S::Connecting, S::Information, S::Negotiate, S::SetProtocol, S::ReadyToAuthenticate]
        },
    };

    for step in path {
        match step {
            S::Connecting => {
                conn.connect(now).unwrap();
            },
            S::Information => {
                conn.handle_text(&server.connected(), now);
            },
            S::Negotiate => {
                conn.handle_text(&server.information(None), now);
            },
            S::SetProtocol => {
                conn.handle_text(&server.negotiate(), now);
            },
            _ => {
                conn.handle_text(&server.set_protocol(json!(1)), now);
            },
        }
    }

    match target {
        S::ServerPreAuthentication => {
            conn.prompt_authentication(now).unwrap();
        },
        S::ServerAuthenticate => {
            conn.handle_text(&server.pre_authentication(json!("srv")), now);
        },
        S::Authenticated => {
            conn.handle_text(&server.pre_authentication(json!("srv")), now);
            conn.complete_authentication(true, now).unwrap();
        },
        S::Disconnected => {
            conn.disconnect(now).unwrap();
        },
        _ => {},
    }

    assert_eq!(conn.state(), target);
    conn
}

/// Whether the transition table accepts `event` in `state`.
fn is_legal(state: ConnectionState, event: &ServerEvent) -> bool {
    use ConnectionState as S;

    match event {
        ServerEvent::Connected => state == S::Connecting,
        ServerEvent::Information => state == S::Information,
        ServerEvent::Negotiate => state == S::Negotiate,
        ServerEvent::SetProtocol => state == S::SetProtocol,
        ServerEvent::PreAuthentication => {
            matches!(state, S::ReadyToAuthenticate | S::ServerPreAuthentication)
        },
        ServerEvent::Authenticate => state.is_authentication_phase(),
        ServerEvent::Ping | ServerEvent::Disconnect => state.is_open(),
        ServerEvent::Error => true,
        ServerEvent::Unhandled(_) => false,
    }
}

/// A payload that satisfies the event's field requirements.
fn valid_data(event: &ServerEvent) -> Value {
    match event {
        ServerEvent::Information => json!({"motd": "hello"}),
        ServerEvent::SetProtocol => json!({"protocol": 1}),
        ServerEvent::PreAuthentication | ServerEvent::Authenticate => json!({"id": "srv"}),
        ServerEvent::Error => json!({"error": "UNKNOWN"}),
        _ => json!({}),
    }
}

fn violation() -> Vec<ConnectionAction> {
    vec![ConnectionAction::Send(ClientMessage::Error(ErrorKind::Violation))]
}

fn state_strategy() -> impl Strategy<Value = ConnectionState> {
    prop::sample::select(ConnectionState::ALL.to_vec())
}

fn event_strategy() -> impl Strategy<Value = ServerEvent> {
    prop::sample::select(ServerEvent::KNOWN.to_vec())
}

#[test]
fn prop_illegal_events_are_violations() {
    proptest!(|(state in state_strategy(), event in event_strategy())| {
        let now = Instant::now();
        let mut conn = connection_in(state, now);
        let challenge = conn.pending_challenge().cloned();

        let frame = ScriptedServer::new().frame(event.name(), valid_data(&event));
        let actions = conn.handle_text(&frame, now);

        if is_legal(state, &event) {
            prop_assert_ne!(actions, violation());
        } else {
            prop_assert_eq!(actions, violation());
            prop_assert_eq!(conn.state(), state);
            prop_assert_eq!(conn.pending_challenge().cloned(), challenge);
        }
    });
}

#[test]
fn prop_unknown_events_are_unknown() {
    proptest!(|(state in state_strategy(), name in "[a-z_]{1,24}")| {
        prop_assume!(matches!(ServerEvent::from_name(&name), ServerEvent::Unhandled(_)));

        let now = Instant::now();
        let mut conn = connection_in(state, now);
        let frame = ScriptedServer::new().frame(&name, json!({}));

        let actions = conn.handle_text(&frame, now);
        prop_assert_eq!(actions, vec![ConnectionAction::Send(ClientMessage::Error(ErrorKind::Unknown))]);
        prop_assert_eq!(conn.state(), state);
    });
}

#[test]
fn prop_arbitrary_text_never_panics() {
    proptest!(|(state in state_strategy(), text in ".{0,256}")| {
        let now = Instant::now();
        let mut conn = connection_in(state, now);

        let actions = conn.handle_text(&text, now);

        // A reported error never moves the state
        prop_assert!(actions.len() <= 2);
        if actions.iter().any(|a| matches!(a, ConnectionAction::Send(ClientMessage::Error(_)))) {
            prop_assert_eq!(conn.state(), state);
        }
    });
}

#[test]
fn prop_rejected_payloads_keep_state() {
    let bad_payloads = prop::sample::select(vec![
        json!({"protocol": null}),
        json!({"protocol": false}),
        json!({"protocol": ""}),
        json!({"protocol": [1]}),
        json!({}),
    ]);

    proptest!(|(data in bad_payloads)| {
        let now = Instant::now();
        let mut conn = connection_in(ConnectionState::SetProtocol, now);
        let frame = ScriptedServer::new().frame("set_protocol", data);

        let actions = conn.handle_text(&frame, now);
        prop_assert_eq!(
            actions,
            vec![ConnectionAction::Send(ClientMessage::Error(ErrorKind::InvalidData))]
        );
        prop_assert_eq!(conn.state(), ConnectionState::SetProtocol);
        prop_assert!(conn.server_information().protocol().is_none());
    });
}

#[test]
fn prop_handshake_timeout_fires_after_deadline() {
    proptest!(|(timeout in 1u64..=120, advance in 0u64..=240)| {
        let now = Instant::now();
        let config = ConnectionConfig {
            handshake_timeout: Some(Duration::from_secs(timeout)),
            ..ConnectionConfig::default()
        };
        let mut conn = new_connection(config);
        conn.connect(now).unwrap();

        let later = now + Duration::from_secs(advance);
        let actions = conn.tick(later);

        if advance > timeout {
            prop_assert!(matches!(actions.as_slice(), [ConnectionAction::Close { .. }]), "{actions:?}");
            prop_assert_eq!(conn.state(), ConnectionState::Disconnected);
        } else {
            prop_assert!(actions.is_empty());
            prop_assert_eq!(conn.state(), ConnectionState::Connecting);
        }
    });
}

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1_000_000i32..1_000_000).prop_map(|n| Value::from(f64::from(n) / 4.0)),
        ".{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|members| Value::Object(members.into_iter().collect())),
        ]
    })
}

fn arb_handshake_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        Just(ClientMessage::Connected),
        (".{0,32}", ".{0,16}")
            .prop_map(|(application, version)| ClientMessage::Information { application, version }),
        (any::<u32>(), any::<u32>())
            .prop_map(|(not_before, not_after)| ClientMessage::Negotiate { not_before, not_after }),
        arb_json().prop_map(|protocol| ClientMessage::AcknowledgeProtocol { protocol }),
        prop::sample::select(ErrorKind::ALL.to_vec()).prop_map(ClientMessage::Error),
    ]
}

fn arb_authentication_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        Just(ClientMessage::PromptAuthentication),
        ".{0,64}".prop_map(|string| ClientMessage::RequestAuthentication { string }),
        any::<bool>().prop_map(|accept| ClientMessage::AuthenticationAcknowledge { accept }),
        ".{0,36}".prop_map(|uuid| ClientMessage::PreAuthentication { uuid }),
        (".{0,64}", ".{0,64}")
            .prop_map(|(string, signed)| ClientMessage::Authenticate { string, signed }),
        Just(ClientMessage::LateAuthenticate),
        Just(ClientMessage::Acknowledge),
    ]
}

fn arb_application_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        (".{0,36}", ".{0,64}", prop::collection::vec(".{0,16}", 0..3)).prop_map(
            |(receiver, content, attachments)| ClientMessage::SendMessage {
                receiver,
                content,
                attachments,
            }
        ),
        Just(ClientMessage::GetMessages),
        ".{0,64}".prop_map(|status| ClientMessage::SetStatus { status }),
        any::<bool>().prop_map(|read_receipts| ClientMessage::SetSettings { read_receipts }),
        ".{0,36}".prop_map(|uuid| ClientMessage::BlockUser { uuid }),
        ".{0,36}".prop_map(|uuid| ClientMessage::UnblockUser { uuid }),
        Just(ClientMessage::GetInfo),
    ]
}

fn arb_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        arb_handshake_message(),
        arb_authentication_message(),
        arb_application_message(),
        prop::sample::select(vec![
            ClientMessage::Ping,
            ClientMessage::PingAcknowledge,
            ClientMessage::Disconnect,
            ClientMessage::DisconnectAcknowledge,
        ]),
    ]
}

#[test]
fn prop_stamped_envelopes_verify() {
    proptest!(|(message in arb_message(), timestamp in any::<u64>())| {
        let conn = new_connection(ConnectionConfig::default());
        let text = conn.encode(&message, timestamp).unwrap();
        let envelope = opensend_proto::Envelope::from_text(&text).unwrap();

        prop_assert!(opensend_harness::server::hash_is_valid(&envelope), "{text}");
        prop_assert_eq!(envelope.event, format!("client:{}", message.event()));
        prop_assert_eq!(envelope.timestamp, timestamp);
    });
}
