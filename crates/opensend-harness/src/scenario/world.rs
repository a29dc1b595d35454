//! World state for scenario execution.
//!
//! The World owns the connection under test together with its simulated
//! clock and the scripted server, executes the actions the connection emits,
//! and records everything an oracle may want to inspect.

use std::time::Instant;

use opensend_core::{
    connection::{Connection, ConnectionAction, ConnectionState},
    error::ConnectionError,
    env::Environment,
};
use opensend_proto::{Envelope, ErrorKind};

use crate::{
    ScriptedServer, SimCrypto, SimEnv,
    server::{hash_is_valid, read_client_frame},
};

/// A message the client put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Bare event name (without `client:`)
    pub event: String,
    /// The envelope as the server would parse it
    pub envelope: Envelope,
    /// Whether the attached hash matches the contents
    pub hash_valid: bool,
}

/// A challenge answer handed to the runtime for signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Server identity the challenge was issued to
    pub uuid: String,
    /// The challenge string
    pub challenge: String,
    /// Signature supplied by the server
    pub signed: String,
}

/// World state containing the connection under test and everything it did.
pub struct World {
    connection: Connection<SimCrypto>,
    env: SimEnv,
    server: ScriptedServer,
    sent: Vec<SentMessage>,
    verifications: Vec<Verification>,
    closed: Option<String>,
    local_errors: Vec<ConnectionError>,
}

impl World {
    /// Create a world around a fresh connection.
    pub fn new(connection: Connection<SimCrypto>, env: SimEnv, server: ScriptedServer) -> Self {
        Self {
            connection,
            env,
            server,
            sent: Vec::new(),
            verifications: Vec::new(),
            closed: None,
            local_errors: Vec::new(),
        }
    }

    /// The connection under test.
    pub fn connection(&self) -> &Connection<SimCrypto> {
        &self.connection
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Every message the client sent, in order.
    pub fn sent(&self) -> &[SentMessage] {
        &self.sent
    }

    /// Event names of every message the client sent, in order.
    pub fn sent_events(&self) -> Vec<&str> {
        self.sent.iter().map(|message| message.event.as_str()).collect()
    }

    /// The most recent message the client sent.
    pub fn last_sent(&self) -> Option<&SentMessage> {
        self.sent.last()
    }

    /// Error kinds the client reported to the server, in order.
    pub fn reported_errors(&self) -> Vec<ErrorKind> {
        self.sent
            .iter()
            .filter(|message| message.event == "error")
            .filter_map(|message| message.envelope.data.get("error")?.as_str())
            .filter_map(ErrorKind::from_code)
            .collect()
    }

    /// Signature verifications requested by the connection.
    pub fn verifications(&self) -> &[Verification] {
        &self.verifications
    }

    /// Close reason, if the connection asked for the transport to close.
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed.as_deref()
    }

    /// Errors returned by local operations.
    pub fn local_errors(&self) -> &[ConnectionError] {
        &self.local_errors
    }

    pub(crate) fn server_mut(&mut self) -> &mut ScriptedServer {
        &mut self.server
    }

    pub(crate) fn pending_challenge(&self) -> Option<String> {
        self.connection.pending_challenge().map(|c| c.challenge().to_string())
    }

    /// Feed server text to the connection and execute the resulting actions.
    pub(crate) fn deliver(&mut self, text: &str) -> Result<(), String> {
        let now = self.env.now();
        let actions = self.connection.handle_text(text, now);
        self.execute(actions)
    }

    /// Run a local operation; its error is recorded rather than propagated.
    pub(crate) fn local<F>(&mut self, operation: F) -> Result<(), String>
    where
        F: FnOnce(
            &mut Connection<SimCrypto>,
            Instant,
        ) -> Result<Vec<ConnectionAction>, ConnectionError>,
    {
        let now = self.env.now();
        match operation(&mut self.connection, now) {
            Ok(actions) => self.execute(actions),
            Err(err) => {
                self.local_errors.push(err);
                Ok(())
            },
        }
    }

    /// Run the periodic timeout check.
    pub(crate) fn tick(&mut self) -> Result<(), String> {
        let now = self.env.now();
        let actions = self.connection.tick(now);
        self.execute(actions)
    }

    fn execute(&mut self, actions: Vec<ConnectionAction>) -> Result<(), String> {
        for action in actions {
            match action {
                ConnectionAction::Send(message) => {
                    let text = self
                        .connection
                        .encode(&message, self.env.unix_millis())
                        .map_err(|e| format!("failed to encode {}: {e}", message.event()))?;
                    let (event, envelope) = read_client_frame(&text)
                        .map_err(|e| format!("client produced an unreadable frame: {e}"))?;
                    let hash_valid = hash_is_valid(&envelope);
                    self.sent.push(SentMessage { event, envelope, hash_valid });
                },
                ConnectionAction::VerifyChallenge { uuid, challenge, signed } => {
                    self.verifications.push(Verification { uuid, challenge, signed });
                },
                ConnectionAction::Close { reason } => {
                    self.closed = Some(reason);
                },
            }
        }
        Ok(())
    }
}
