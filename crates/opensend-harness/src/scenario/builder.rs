//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use opensend_core::{
    codec::{CodecConfig, EnvelopeCodec},
    connection::{Connection, ConnectionConfig},
    identity::{ApplicationIdentity, ProtocolWindow},
};
use opensend_proto::ClientMessage;
use serde_json::Value;
use tracing::debug;

use crate::{
    ScriptedServer, SimCrypto, SimEnv,
    scenario::{OracleFn, World},
};

/// One step of a scenario.
#[derive(Debug, Clone)]
pub enum Step {
    /// Local `connect`
    Connect,
    /// Server sends the four handshake frames, agreeing on protocol 1
    Handshake,
    /// Server sends `server:{event}` with this data
    Frame {
        /// Bare event name
        event: String,
        /// Event data
        data: Value,
    },
    /// Server sends `server:{event}` whose hash does not match its data
    ForgedFrame {
        /// Bare event name
        event: String,
        /// Event data, before tampering
        data: Value,
    },
    /// Server sends raw text
    Raw(String),
    /// Server answers the pending challenge with this signature
    AnswerChallenge {
        /// Signature to attach
        signed: String,
    },
    /// Local `prompt_authentication`
    PromptAuthentication,
    /// Runtime finished verifying the signature
    CompleteAuthentication {
        /// Verification outcome
        accept: bool,
    },
    /// Local `send`
    Send(ClientMessage),
    /// Local `disconnect`
    Disconnect,
    /// Advance the clock, then run the timeout check
    Advance(Duration),
}

impl Step {
    /// Shorthand for [`Step::Frame`].
    pub fn frame(event: impl Into<String>, data: Value) -> Self {
        Self::Frame { event: event.into(), data }
    }

    /// Steps that take a ready connection to `Authenticated`: the server
    /// identifies as `id`, answers the challenge, and verification succeeds.
    pub fn authentication(id: &str) -> Vec<Step> {
        vec![
            Self::frame("pre_authentication", serde_json::json!({ "id": id })),
            Self::AnswerChallenge { signed: format!("signed-by-{id}") },
            Self::CompleteAuthentication { accept: true },
        ]
    }
}

/// Scenario builder.
///
/// Construct a scenario by configuring the connection and adding steps.
/// Must call `.oracle()` to get a RunnableScenario that can be executed.
pub struct Scenario {
    name: String,
    identity: ApplicationIdentity,
    config: ConnectionConfig,
    codec: CodecConfig,
    seed: u64,
    hashed_server: bool,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: ApplicationIdentity::new(
                "opensend-harness",
                env!("CARGO_PKG_VERSION"),
                ProtocolWindow::default(),
            ),
            config: ConnectionConfig::default(),
            codec: CodecConfig::default(),
            seed: 0,
            hashed_server: false,
            steps: Vec::new(),
        }
    }

    /// Use a custom application identity.
    pub fn identity(mut self, identity: ApplicationIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Use a custom connection configuration.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom codec configuration.
    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    /// Seed the simulated RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Have the scripted server hash its envelopes.
    pub fn hashed_server(mut self) -> Self {
        self.hashed_server = true;
        self
    }

    /// Append one step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Runs every step in order against one connection, executing the
    /// actions it emits, then runs the oracle to verify the final state.
    /// Errors from local operations are recorded in the world, not returned;
    /// only harness failures (e.g. answering a challenge that was never
    /// issued) abort the run.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, identity, config, codec, seed, hashed_server, steps } =
            self.scenario;

        let env = SimEnv::new();
        let codec = EnvelopeCodec::new(SimCrypto::with_seed(seed), codec);
        let server = if hashed_server { ScriptedServer::hashed() } else { ScriptedServer::new() };
        let mut world = World::new(Connection::new(identity, codec, config), env, server);

        for (index, step) in steps.into_iter().enumerate() {
            debug!(scenario = %name, index, ?step, "executing step");
            run_step(&mut world, step)
                .map_err(|e| format!("Scenario '{name}': step {index} failed: {e}"))?;
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

fn run_step(world: &mut World, step: Step) -> Result<(), String> {
    match step {
        Step::Connect => world.local(|conn, now| conn.connect(now)),
        Step::Handshake => {
            let frames = world.server_mut().handshake();
            for frame in frames {
                world.deliver(&frame)?;
            }
            Ok(())
        },
        Step::Frame { event, data } => {
            let frame = world.server_mut().frame(&event, data);
            world.deliver(&frame)
        },
        Step::ForgedFrame { event, data } => {
            let frame = world.server_mut().forged_frame(&event, data);
            world.deliver(&frame)
        },
        Step::Raw(text) => world.deliver(&text),
        Step::AnswerChallenge { signed } => {
            let challenge =
                world.pending_challenge().ok_or("no challenge pending to answer")?;
            let frame = world.server_mut().answer_challenge(&challenge, &signed);
            world.deliver(&frame)
        },
        Step::PromptAuthentication => world.local(|conn, now| conn.prompt_authentication(now)),
        Step::CompleteAuthentication { accept } => {
            world.local(|conn, now| conn.complete_authentication(accept, now))
        },
        Step::Send(message) => world.local(|conn, _| conn.send(message)),
        Step::Disconnect => world.local(|conn, now| conn.disconnect(now)),
        Step::Advance(duration) => {
            world.env().advance(duration);
            world.tick()
        },
    }
}

#[cfg(test)]
mod tests {
    use opensend_core::connection::ConnectionState;

    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").step(Step::Connect).oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test").step(Step::Connect);
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn scenario_runs_steps_in_order() {
        let scenario = Scenario::new("test").step(Step::Connect).step(Step::Handshake).oracle(
            Box::new(|world| {
                assert_eq!(world.state(), ConnectionState::ReadyToAuthenticate);
                assert_eq!(world.sent().len(), 4);
                Ok(())
            }),
        );

        scenario.run().expect("scenario should succeed");
    }

    #[test]
    fn answering_without_challenge_aborts() {
        let result = Scenario::new("no challenge")
            .step(Step::AnswerChallenge { signed: "sig".to_string() })
            .oracle(Box::new(|_| Ok(())))
            .run();
        let err = result.unwrap_err();
        assert!(err.contains("step 0"), "unexpected error: {err}");
    }

    #[test]
    fn oracle_failure_names_scenario() {
        let result = Scenario::new("failing").oracle(Box::new(|_| Err("nope".to_string()))).run();
        assert_eq!(result, Err("Scenario 'failing': nope".to_string()));
    }
}
