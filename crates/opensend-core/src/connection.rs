//! Connection state machine for the OpenSend client.
//!
//! This module implements the session layer: the ordered handshake, the
//! challenge/response authentication, and handshake/authentication timeouts.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as parameter (no stored clock)
//! - Local operations return `Result<Vec<ConnectionAction>, ConnectionError>`
//! - Inbound dispatch returns `Vec<ConnectionAction>` and never fails: peer
//!   mistakes are answered with `client:error` replies
//! - Driver code executes actions (stamp and send, verify, close)
//!
//! # State Machine
//!
//! ```text
//! ┌──────────┐ connect ┌────────────┐ connected ┌─────────────┐ information ┌───────────┐
//! │ Inactive │────────>│ Connecting │──────────>│ Information │────────────>│ Negotiate │
//! └──────────┘         └────────────┘           └─────────────┘             └───────────┘
//!                                                                                 │ negotiate
//!                       ┌─────────────────────┐  set_protocol  ┌─────────────┐   │
//!                       │ ReadyToAuthenticate │<───────────────│ SetProtocol │<──┘
//!                       └─────────────────────┘                └─────────────┘
//!                          │        │ prompt_authentication
//!                          │        ↓
//!                          │   ┌─────────────────────────┐
//!                          │   │ ServerPreAuthentication │
//!                          │   └─────────────────────────┘
//!                          │        │ pre_authentication / authenticate {id}
//!                          ↓        ↓
//!                       ┌────────────────────┐ complete_authentication(true) ┌───────────────┐
//!                       │ ServerAuthenticate │──────────────────────────────>│ Authenticated │
//!                       └────────────────────┘                               └───────────────┘
//!
//!   any open state ── disconnect / server:disconnect / timeout ──> Disconnected
//! ```
//!
//! A rejected challenge answer returns the connection to
//! `ReadyToAuthenticate`.
//!
//! # Timeouts
//!
//! - **Handshake timeout**: 30 seconds from `connect` to `ReadyToAuthenticate`
//! - **Authentication timeout**: 60 seconds in the authentication states
//!
//! Either can be disabled by setting it to `None`.

use std::time::{Duration, Instant};

use opensend_crypto::CryptoProvider;
use opensend_proto::{
    ClientMessage, ServerEvent,
    payloads::{
        ChallengeResponsePayload, ErrorPayload, InformationPayload, PreAuthenticationPayload,
        SetProtocolPayload,
    },
};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthenticationChallenge, AuthenticationFlow},
    codec::{EnvelopeCodec, Inbound},
    error::ConnectionError,
    identity::ApplicationIdentity,
    reporter::{self, Rejection},
    server_info::ServerInformation,
};

/// Actions returned by the connection state machine.
///
/// The driver executes these actions:
/// - `Send`: stamp the message through the codec and send it
/// - `VerifyChallenge`: check the server's signature, then call
///   [`Connection::complete_authentication`]
/// - `Close`: close the transport with the given reason
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Send this message to the server
    Send(ClientMessage),

    /// Verify the server's signature over our challenge
    VerifyChallenge {
        /// Server identity the challenge was issued to
        uuid: String,
        /// The challenge string
        challenge: String,
        /// Signature supplied by the server
        signed: String,
    },

    /// Close the connection with this reason
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, not yet connecting
    Inactive,
    /// Transport opening, waiting for `server:connected`
    Connecting,
    /// Waiting for `server:information`
    Information,
    /// Waiting for `server:negotiate`
    Negotiate,
    /// Waiting for `server:set_protocol`
    SetProtocol,
    /// Handshake complete; server information frozen
    ReadyToAuthenticate,
    /// Client has prompted the server to start authentication
    ServerPreAuthentication,
    /// Challenge issued, waiting for the server's answer
    ServerAuthenticate,
    /// Challenge answered and accepted
    Authenticated,
    /// Connection terminated
    Disconnected,
}

impl ConnectionState {
    /// Every state, in handshake order.
    pub const ALL: [ConnectionState; 10] = [
        Self::Inactive,
        Self::Connecting,
        Self::Information,
        Self::Negotiate,
        Self::SetProtocol,
        Self::ReadyToAuthenticate,
        Self::ServerPreAuthentication,
        Self::ServerAuthenticate,
        Self::Authenticated,
        Self::Disconnected,
    ];

    /// Whether a transport is (or should be) open.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Inactive | Self::Disconnected)
    }

    /// States covered by the handshake timeout.
    pub fn is_handshaking(self) -> bool {
        matches!(self, Self::Connecting | Self::Information | Self::Negotiate | Self::SetProtocol)
    }

    /// States covered by the authentication timeout.
    pub fn is_authenticating(self) -> bool {
        matches!(self, Self::ServerPreAuthentication | Self::ServerAuthenticate)
    }

    /// States in which authentication messages may be emitted.
    pub fn is_authentication_phase(self) -> bool {
        self == Self::ReadyToAuthenticate || self.is_authenticating()
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Timeout for completing the handshake (`None` waits forever)
    pub handshake_timeout: Option<Duration>,
    /// Timeout for completing authentication (`None` waits forever)
    pub authentication_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(Duration::from_secs(30)),
            authentication_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Connection state machine
///
/// Owns the state, the negotiated server information and the pending
/// challenge for exactly one logical connection. Nothing is shared between
/// connections.
///
/// This is a pure state machine - no I/O, no stored clock.
#[derive(Debug)]
pub struct Connection<C> {
    /// Current state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// What we announce about ourselves
    identity: ApplicationIdentity,
    /// What the server told us
    server: ServerInformation,
    /// Pending challenge, if any
    auth: AuthenticationFlow,
    /// Envelope codec (owns the crypto provider)
    codec: EnvelopeCodec<C>,
    /// When the current timed phase started
    phase_started: Option<Instant>,
}

impl<C: CryptoProvider> Connection<C> {
    /// Create a new connection in [`ConnectionState::Inactive`] state
    pub fn new(
        identity: ApplicationIdentity,
        codec: EnvelopeCodec<C>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            state: ConnectionState::Inactive,
            config,
            identity,
            server: ServerInformation::default(),
            auth: AuthenticationFlow::default(),
            codec,
            phase_started: None,
        }
    }

    /// Get current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server information negotiated so far
    pub fn server_information(&self) -> &ServerInformation {
        &self.server
    }

    /// Local application identity
    pub fn identity(&self) -> &ApplicationIdentity {
        &self.identity
    }

    /// Challenge awaiting the server's answer
    pub fn pending_challenge(&self) -> Option<&AuthenticationChallenge> {
        self.auth.pending()
    }

    /// The envelope codec
    pub fn codec(&self) -> &EnvelopeCodec<C> {
        &self.codec
    }

    /// Stamp and serialize an outgoing message.
    pub fn encode(&self, message: &ClientMessage, timestamp: u64) -> Result<String, ConnectionError> {
        Ok(self.codec.encode(message, timestamp)?)
    }

    /// Client: start connecting
    ///
    /// The driver opens the transport; the connection then waits for
    /// `server:connected`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if not in Inactive state
    pub fn connect(&mut self, now: Instant) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state == ConnectionState::Inactive, "connect")?;
        self.transition(ConnectionState::Connecting, now);
        Ok(vec![])
    }

    /// Client: tell the server we are ready to authenticate
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if not in ReadyToAuthenticate state
    pub fn prompt_authentication(
        &mut self,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state == ConnectionState::ReadyToAuthenticate, "prompt_authentication")?;
        self.transition(ConnectionState::ServerPreAuthentication, now);
        Ok(vec![ConnectionAction::Send(ClientMessage::PromptAuthentication)])
    }

    /// Client: finish authentication after verifying the server's signature
    ///
    /// Drops the pending challenge either way. Acceptance moves to
    /// Authenticated; rejection returns to ReadyToAuthenticate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless a challenge is pending in
    /// ServerAuthenticate state
    pub fn complete_authentication(
        &mut self,
        accept: bool,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(
            self.state == ConnectionState::ServerAuthenticate && self.auth.pending().is_some(),
            "complete_authentication",
        )?;

        if let Some(challenge) = self.auth.take() {
            info!(uuid = challenge.uuid(), accept, "authentication finished");
        }

        let next = if accept {
            ConnectionState::Authenticated
        } else {
            ConnectionState::ReadyToAuthenticate
        };
        self.transition(next, now);

        Ok(vec![ConnectionAction::Send(ClientMessage::AuthenticationAcknowledge { accept })])
    }

    /// Client: identify the local user
    pub fn pre_authentication(
        &self,
        uuid: impl Into<String>,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state.is_authentication_phase(), "pre_authentication")?;
        Ok(vec![ConnectionAction::Send(ClientMessage::PreAuthentication { uuid: uuid.into() })])
    }

    /// Client: answer a challenge with its signature
    pub fn authenticate(
        &self,
        string: impl Into<String>,
        signed: impl Into<String>,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state.is_authentication_phase(), "authenticate")?;
        Ok(vec![ConnectionAction::Send(ClientMessage::Authenticate {
            string: string.into(),
            signed: signed.into(),
        })])
    }

    /// Client: ask to authenticate after missing the window
    pub fn late_authenticate(&self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state.is_authentication_phase(), "late_authenticate")?;
        Ok(vec![ConnectionAction::Send(ClientMessage::LateAuthenticate)])
    }

    /// Client: send an application message
    ///
    /// # Errors
    ///
    /// - `NotApplicationMessage` for handshake/authentication messages
    /// - `InvalidState` if not Authenticated
    pub fn send(&self, message: ClientMessage) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !message.is_application_message() {
            return Err(ConnectionError::NotApplicationMessage { event: message.event() });
        }
        self.require(self.state == ConnectionState::Authenticated, "send")?;
        Ok(vec![ConnectionAction::Send(message)])
    }

    /// Client: announce disconnect and close
    pub fn disconnect(&mut self, now: Instant) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require(self.state.is_open(), "disconnect")?;
        self.auth.clear();
        self.transition(ConnectionState::Disconnected, now);
        Ok(vec![
            ConnectionAction::Send(ClientMessage::Disconnect),
            ConnectionAction::Close { reason: "client disconnected".to_string() },
        ])
    }

    /// Check if the current phase has timed out
    ///
    /// Returns the timeout error if so, `None` otherwise
    #[must_use]
    pub fn check_timeout(&self, now: Instant) -> Option<ConnectionError> {
        let started = self.phase_started?;
        let elapsed = now.saturating_duration_since(started);

        if self.state.is_handshaking() {
            let timeout = self.config.handshake_timeout?;
            (elapsed > timeout).then_some(ConnectionError::HandshakeTimeout { elapsed })
        } else if self.state.is_authenticating() {
            let timeout = self.config.authentication_timeout?;
            (elapsed > timeout).then_some(ConnectionError::AuthenticationTimeout { elapsed })
        } else {
            None
        }
    }

    /// Tick the state machine - check for timeouts
    ///
    /// Call this periodically. Returns a `Close` action once a configured
    /// timeout expires.
    pub fn tick(&mut self, now: Instant) -> Vec<ConnectionAction> {
        let Some(err) = self.check_timeout(now) else {
            return Vec::new();
        };

        warn!(state = ?self.state, %err, "closing connection");
        self.auth.clear();
        self.transition(ConnectionState::Disconnected, now);
        vec![ConnectionAction::Close { reason: err.to_string() }]
    }

    /// Handle raw inbound text
    ///
    /// Dispatch entry point for the transport. Never fails: unparseable text
    /// is logged and dropped, everything else that cannot be applied is
    /// answered with a `client:error` reply and leaves the state unchanged.
    pub fn handle_text(&mut self, text: &str, now: Instant) -> Vec<ConnectionAction> {
        match self.codec.decode(text) {
            Ok(inbound) => self.handle_inbound(&inbound, now),
            Err(err) => match err.reply_kind() {
                Some(kind) => {
                    warn!(state = ?self.state, %err, %kind, "rejecting inbound frame");
                    vec![reporter::report(kind)]
                },
                None => {
                    warn!(state = ?self.state, %err, "dropping unparseable frame");
                    Vec::new()
                },
            },
        }
    }

    /// Handle an already decoded inbound envelope
    pub fn handle_inbound(&mut self, inbound: &Inbound, now: Instant) -> Vec<ConnectionAction> {
        match self.dispatch(inbound, now) {
            Ok(actions) => actions,
            Err(rejection) => {
                let kind = rejection.kind();
                warn!(state = ?self.state, %rejection, %kind, "rejecting inbound event");
                vec![reporter::report(kind)]
            },
        }
    }

    fn dispatch(
        &mut self,
        inbound: &Inbound,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, Rejection> {
        use ConnectionState as S;

        let envelope = &inbound.envelope;
        match (&inbound.event, self.state) {
            (ServerEvent::Connected, S::Connecting) => {
                self.transition(S::Information, now);
                Ok(vec![ConnectionAction::Send(ClientMessage::Connected)])
            },
            (ServerEvent::Information, S::Information) => {
                let payload: InformationPayload = envelope.payload()?;
                self.server.adopt_motd(payload.motd());
                self.transition(S::Negotiate, now);
                Ok(vec![ConnectionAction::Send(self.identity.information())])
            },
            (ServerEvent::Negotiate, S::Negotiate) => {
                self.transition(S::SetProtocol, now);
                Ok(vec![ConnectionAction::Send(self.identity.negotiate())])
            },
            (ServerEvent::SetProtocol, S::SetProtocol) => {
                let payload: SetProtocolPayload = envelope.payload()?;
                let protocol =
                    payload.protocol().cloned().ok_or_else(|| missing(&inbound.event, "protocol"))?;
                self.server.set_protocol(protocol.clone());
                self.transition(S::ReadyToAuthenticate, now);
                Ok(vec![ConnectionAction::Send(ClientMessage::AcknowledgeProtocol { protocol })])
            },
            (
                ServerEvent::PreAuthentication | ServerEvent::Authenticate,
                S::ReadyToAuthenticate | S::ServerPreAuthentication,
            ) => self.begin_authentication(inbound, now),
            (ServerEvent::Authenticate, S::ServerAuthenticate) => {
                self.receive_challenge_response(inbound, now)
            },
            (ServerEvent::Ping, state) if state.is_open() => {
                Ok(vec![ConnectionAction::Send(ClientMessage::PingAcknowledge)])
            },
            (ServerEvent::Disconnect, state) if state.is_open() => {
                self.auth.clear();
                self.transition(S::Disconnected, now);
                Ok(vec![
                    ConnectionAction::Send(ClientMessage::DisconnectAcknowledge),
                    ConnectionAction::Close { reason: "server requested disconnect".to_string() },
                ])
            },
            (ServerEvent::Error, _) => {
                let payload: ErrorPayload = envelope.payload().unwrap_or_default();
                warn!(
                    error = payload.error.as_deref().unwrap_or("unspecified"),
                    message = payload.message.as_deref().unwrap_or_default(),
                    "server reported an error"
                );
                Ok(Vec::new())
            },
            (ServerEvent::Unhandled(event), _) => Err(Rejection::Unhandled { event: event.clone() }),
            (event, state) => Err(Rejection::Violation { event: event.name().to_string(), state }),
        }
    }

    fn begin_authentication(
        &mut self,
        inbound: &Inbound,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, Rejection> {
        let payload: PreAuthenticationPayload = inbound.envelope.payload()?;
        let uuid = payload.id().ok_or_else(|| missing(&inbound.event, "id"))?;

        let challenge = self
            .auth
            .begin(uuid, self.codec.crypto())
            .map_err(|e| Rejection::Internal(e.to_string()))?;
        let string = challenge.challenge().to_string();
        debug!(uuid = challenge.uuid(), "issued authentication challenge");

        self.transition(ConnectionState::ServerAuthenticate, now);
        Ok(vec![ConnectionAction::Send(ClientMessage::RequestAuthentication { string })])
    }

    fn receive_challenge_response(
        &mut self,
        inbound: &Inbound,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, Rejection> {
        let payload: ChallengeResponsePayload = inbound.envelope.payload()?;
        let string = payload
            .string
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing(&inbound.event, "string"))?;
        let signed = payload
            .signed
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing(&inbound.event, "signed"))?;

        let Some(challenge) = self.auth.pending() else {
            return Err(Rejection::Internal("no pending challenge".to_string()));
        };

        if challenge.matches(&string) {
            return Ok(vec![ConnectionAction::VerifyChallenge {
                uuid: challenge.uuid().to_string(),
                challenge: string,
                signed,
            }]);
        }

        warn!(uuid = challenge.uuid(), "server answered a challenge we did not issue");
        self.auth.clear();
        self.transition(ConnectionState::ReadyToAuthenticate, now);
        Ok(vec![ConnectionAction::Send(ClientMessage::AuthenticationAcknowledge { accept: false })])
    }

    fn transition(&mut self, next: ConnectionState, now: Instant) {
        let entering_timed_phase = (next.is_handshaking() && !self.state.is_handshaking())
            || (next.is_authenticating() && !self.state.is_authenticating());
        if entering_timed_phase {
            self.phase_started = Some(now);
        }

        debug!(from = ?self.state, to = ?next, "connection state transition");
        self.state = next;
    }

    fn require(&self, allowed: bool, operation: &str) -> Result<(), ConnectionError> {
        if allowed {
            Ok(())
        } else {
            Err(ConnectionError::InvalidState { state: self.state, operation: operation.to_string() })
        }
    }
}

fn missing(event: &ServerEvent, field: &'static str) -> Rejection {
    Rejection::MissingField { event: event.name().to_string(), field }
}
