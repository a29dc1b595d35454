//! OpenSend client runtime
//!
//! Drives an `opensend-core` [`Connection`](opensend_core::connection::Connection)
//! over a real transport. The runtime owns the connection inside a single
//! task and multiplexes inbound frames, user commands and timeout ticks, so
//! every event is processed to completion before the next one starts.
//!
//! # Components
//!
//! - [`Runtime`]: Orchestration loop (dispatch, action execution, timeouts)
//! - [`commands`]: Parsing of text commands into [`Command`]s
//! - [`ClientConfig`]: Configuration assembled from CLI arguments
//! - [`ChallengeVerifier`]: Pluggable signature check for challenge answers
//! - [`SystemEnv`]: Production environment (system clock)
//! - [`WebSocketTransport`]: Production transport (feature `transport`)
#![forbid(unsafe_code)]

pub mod commands;
mod config;
mod error;
mod runtime;
mod system_env;
mod verifier;
#[cfg(feature = "transport")]
mod websocket;

pub use commands::Command;
pub use config::{Args, ClientConfig};
pub use error::ClientError;
pub use runtime::{Runtime, RuntimeOptions};
pub use system_env::SystemEnv;
pub use verifier::{ChallengeVerifier, TrustedServers};
#[cfg(feature = "transport")]
pub use websocket::{WebSocketConnection, WebSocketTransport};
