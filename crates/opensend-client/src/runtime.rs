//! Orchestration loop for one OpenSend connection.
//!
//! The runtime is the only owner of the [`Connection`]. Inbound frames, user
//! commands and timeout ticks are multiplexed with `tokio::select!` inside a
//! single task, so dispatch is serialized: one event is processed to
//! completion (including sending every reply) before the next is looked at.

use std::{collections::VecDeque, time::Duration};

use opensend_core::{
    connection::{Connection, ConnectionAction, ConnectionState},
    env::Environment,
    error::ConnectionError,
    transport::{Transport, TransportConnection},
};
use opensend_crypto::CryptoProvider;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{ChallengeVerifier, ClientError, Command};

/// Runtime behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// How often timeouts are checked
    pub tick_interval: Duration,
    /// Prompt the server to authenticate once the handshake completes
    pub prompt_authentication: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { tick_interval: Duration::from_secs(1), prompt_authentication: false }
    }
}

/// Drives a connection over an open transport.
pub struct Runtime<T, E, C, V> {
    connection: Connection<C>,
    channel: T,
    env: E,
    verifier: V,
    options: RuntimeOptions,
    prompted: bool,
}

impl<T, E, C, V> Runtime<T, E, C, V>
where
    T: TransportConnection,
    E: Environment,
    C: CryptoProvider,
    V: ChallengeVerifier,
{
    /// Open the transport and put the connection into `Connecting`.
    ///
    /// # Errors
    ///
    /// - `Connection` if the connection is not `Inactive`
    /// - `Connect` if the transport cannot be opened
    pub async fn connect<Tr>(
        transport: &Tr,
        address: &str,
        mut connection: Connection<C>,
        env: E,
        verifier: V,
        options: RuntimeOptions,
    ) -> Result<Self, ClientError>
    where
        Tr: Transport<Connection = T>,
    {
        info!(address, "Connecting to remote server");
        connection.connect(env.now())?;

        let channel = transport.connect(address).await.map_err(|source| {
            error!(address, %source, "failed to connect");
            ClientError::Connect { address: address.to_string(), source }
        })?;

        info!("Connected. Waiting for server");
        Ok(Self { connection, channel, env, verifier, options, prompted: false })
    }

    /// The connection being driven.
    pub fn connection(&self) -> &Connection<C> {
        &self.connection
    }

    /// Run until the connection is disconnected or the server hangs up.
    ///
    /// Commands are optional: once the sender side is dropped the runtime
    /// keeps serving the server. Returns the final connection state.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if receiving from the transport fails.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
    ) -> Result<ConnectionState, ClientError> {
        let mut ticker = time::interval(self.options.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        while self.connection.state() != ConnectionState::Disconnected {
            tokio::select! {
                inbound = self.channel.recv_text() => match inbound? {
                    Some(text) => {
                        let actions = self.connection.handle_text(&text, self.env.now());
                        self.execute(actions).await;
                        self.maybe_prompt().await;
                    },
                    None => {
                        info!(state = ?self.connection.state(), "server closed the connection");
                        break;
                    },
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.apply(command).await,
                    None => commands_open = false,
                },
                _ = ticker.tick() => {
                    let actions = self.connection.tick(self.env.now());
                    self.execute(actions).await;
                },
            }
        }

        Ok(self.connection.state())
    }

    async fn apply(&mut self, command: Command) {
        let now = self.env.now();
        let result = match command {
            Command::PromptAuthentication => self.connection.prompt_authentication(now),
            Command::PreAuthentication { uuid } => self.connection.pre_authentication(uuid),
            Command::Authenticate { string, signed } => {
                self.connection.authenticate(string, signed)
            },
            Command::LateAuthenticate => self.connection.late_authenticate(),
            Command::Send(message) => self.connection.send(message),
            Command::Quit => self.connection.disconnect(now),
            Command::Unknown { input } => {
                warn!(input, "unknown command");
                return;
            },
            Command::InvalidArgs { command, error } => {
                warn!(command, error, "invalid command arguments");
                return;
            },
        };

        match result {
            Ok(actions) => self.execute(actions).await,
            Err(err) => warn!(%err, "command rejected"),
        }
    }

    async fn maybe_prompt(&mut self) {
        if !self.options.prompt_authentication
            || self.prompted
            || self.connection.state() != ConnectionState::ReadyToAuthenticate
        {
            return;
        }

        self.prompted = true;
        match self.connection.prompt_authentication(self.env.now()) {
            Ok(actions) => self.execute(actions).await,
            Err(err) => warn!(%err, "could not prompt authentication"),
        }
    }

    /// Execute actions in order. Follow-up actions (from completing a
    /// verification) run before anything queued after them.
    async fn execute(&mut self, actions: Vec<ConnectionAction>) {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                ConnectionAction::Send(message) => {
                    let event = message.event();
                    let text = match self.connection.encode(&message, self.env.unix_millis()) {
                        Ok(text) => text,
                        Err(err) => {
                            error!(event, %err, "failed to encode message");
                            continue;
                        },
                    };
                    match self.channel.send_text(text).await {
                        Ok(()) => debug!(event, "sent"),
                        Err(err) => error!(event, %err, "failed to send message"),
                    }
                },
                ConnectionAction::VerifyChallenge { uuid, challenge, signed } => {
                    let accept = self.verifier.verify(&uuid, &challenge, &signed);
                    match self.connection.complete_authentication(accept, self.env.now()) {
                        Ok(follow_up) => {
                            for action in follow_up.into_iter().rev() {
                                queue.push_front(action);
                            }
                        },
                        Err(err) => log_unexpected(&err),
                    }
                },
                ConnectionAction::Close { reason } => {
                    info!(reason, "closing connection");
                    if let Err(err) = self.channel.close(&reason).await {
                        warn!(%err, "failed to close transport");
                    }
                },
            }
        }
    }
}

fn log_unexpected(err: &ConnectionError) {
    error!(%err, "connection refused its own action");
}
