//! Scenario tests for challenge/response authentication.

use opensend_core::{auth::CHALLENGE_LENGTH, connection::ConnectionState, error::ConnectionError};
use opensend_harness::scenario::{Scenario, Step, oracle};
use opensend_proto::{ClientMessage, ErrorKind};
use serde_json::json;

fn ready() -> Scenario {
    Scenario::new("authentication").step(Step::Connect).step(Step::Handshake)
}

#[test]
fn scenario_pre_authentication_issues_challenge() {
    let result = ready()
        .step(Step::frame("pre_authentication", json!({"id": "server-7"})))
        .oracle(Box::new(|world| {
            assert_eq!(world.state(), ConnectionState::ServerAuthenticate);

            let challenge = world.connection().pending_challenge().ok_or("no challenge")?;
            assert_eq!(challenge.uuid(), "server-7");
            assert_eq!(challenge.challenge().len(), CHALLENGE_LENGTH * 2);

            let request = world.last_sent().ok_or("nothing sent")?;
            assert_eq!(request.event, "request_authentication");
            assert_eq!(request.envelope.data.get("string"), Some(&json!(challenge.challenge())));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_full_authentication() {
    let result = ready()
        .steps(Step::authentication("server-7"))
        .oracle(oracle::all_of(vec![
            oracle::in_state(ConnectionState::Authenticated),
            oracle::sent_events(vec![
                "connected",
                "information",
                "negotiate",
                "acknowledge_protocol",
                "request_authentication",
                "authentication_acknowledge",
            ]),
            oracle::all_hashes_valid(),
            oracle::no_local_errors(),
            Box::new(|world| {
                let [verification] = world.verifications() else {
                    return Err(format!("expected one verification, got {:?}", world.verifications()));
                };
                assert_eq!(verification.uuid, "server-7");
                assert_eq!(verification.signed, "signed-by-server-7");
                assert!(world.connection().pending_challenge().is_none());

                let ack = world.last_sent().ok_or("nothing sent")?;
                assert_eq!(ack.envelope.data.get("accept"), Some(&json!(true)));
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_prompted_authentication() {
    let result = ready()
        .step(Step::PromptAuthentication)
        .step(Step::frame("authenticate", json!({"id": 99})))
        .oracle(Box::new(|world| {
            assert_eq!(world.state(), ConnectionState::ServerAuthenticate);
            assert_eq!(&world.sent_events()[4..], ["prompt_authentication", "request_authentication"]);
            assert_eq!(world.connection().pending_challenge().map(|c| c.uuid()), Some("99"));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_pre_authentication_before_handshake_is_violation() {
    let result = Scenario::new("early pre_authentication")
        .step(Step::Connect)
        .step(Step::frame("connected", json!({})))
        .step(Step::frame("pre_authentication", json!({"id": "srv"})))
        .oracle(oracle::all_of(vec![
            oracle::in_state(ConnectionState::Information),
            oracle::reported_errors(vec![ErrorKind::Violation]),
            Box::new(|world| {
                assert!(world.connection().pending_challenge().is_none());
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_pre_authentication_without_id_is_invalid_data() {
    let result = ready()
        .step(Step::frame("pre_authentication", json!({"id": ""})))
        .oracle(oracle::all_of(vec![
            oracle::in_state(ConnectionState::ReadyToAuthenticate),
            oracle::reported_errors(vec![ErrorKind::InvalidData]),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_wrong_challenge_is_refused() {
    let result = ready()
        .step(Step::frame("pre_authentication", json!({"id": "srv"})))
        .step(Step::frame("authenticate", json!({"string": "forged", "signed": "sig"})))
        .oracle(Box::new(|world| {
            assert_eq!(world.state(), ConnectionState::ReadyToAuthenticate);
            assert!(world.verifications().is_empty());
            assert!(world.connection().pending_challenge().is_none());
            let ack = world.last_sent().ok_or("nothing sent")?;
            assert_eq!(ack.event, "authentication_acknowledge");
            assert_eq!(ack.envelope.data.get("accept"), Some(&json!(false)));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_rejected_signature_allows_retry() {
    let result = ready()
        .step(Step::frame("pre_authentication", json!({"id": "srv"})))
        .step(Step::AnswerChallenge { signed: "bad".to_string() })
        .step(Step::CompleteAuthentication { accept: false })
        .steps(Step::authentication("srv"))
        .oracle(oracle::all_of(vec![
            oracle::in_state(ConnectionState::Authenticated),
            Box::new(|world| {
                let verifications = world.verifications();
                assert_eq!(verifications.len(), 2);
                assert_ne!(
                    verifications[0].challenge, verifications[1].challenge,
                    "each attempt gets a fresh challenge"
                );
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}

#[test]
fn scenario_same_seed_same_challenge() {
    let challenge_for = |seed: u64| {
        let captured = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
        let sink = captured.clone();
        ready()
            .seed(seed)
            .step(Step::frame("pre_authentication", json!({"id": "srv"})))
            .oracle(Box::new(move |world| {
                let challenge = world.connection().pending_challenge().ok_or("no challenge")?;
                *sink.borrow_mut() = challenge.challenge().to_string();
                Ok(())
            }))
            .run()
            .unwrap();
        captured.take()
    };

    assert_eq!(challenge_for(7), challenge_for(7));
    assert_ne!(challenge_for(7), challenge_for(8));
}

#[test]
fn scenario_application_messages_after_authentication() {
    let result = ready()
        .step(Step::Send(ClientMessage::GetMessages))
        .steps(Step::authentication("srv"))
        .step(Step::Send(ClientMessage::SendMessage {
            receiver: "bob".to_string(),
            content: "hello".to_string(),
            attachments: vec![],
        }))
        .step(Step::Send(ClientMessage::PromptAuthentication))
        .oracle(Box::new(|world| {
            assert_eq!(world.state(), ConnectionState::Authenticated);
            assert_eq!(world.last_sent().map(|m| m.event.as_str()), Some("send_message"));

            match world.local_errors() {
                [
                    ConnectionError::InvalidState { state: ConnectionState::ReadyToAuthenticate, .. },
                    ConnectionError::NotApplicationMessage { event: "prompt_authentication" },
                ] => Ok(()),
                other => Err(format!("unexpected local errors: {other:?}")),
            }
        }))
        .run();

    assert!(result.is_ok(), "scenario failed: {result:?}");
}
