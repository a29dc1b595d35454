//! Deterministic simulation harness for OpenSend protocol testing.
//!
//! This crate provides simulated implementations of the `Environment`,
//! `CryptoProvider` and `Transport` seams, plus a scripted server and a
//! scenario framework, so protocol behavior can be tested reproducibly without
//! sockets, wall clocks or OS entropy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod server;
pub mod sim_crypto;
pub mod sim_env;
pub mod sim_transport;

pub use server::ScriptedServer;
pub use sim_crypto::SimCrypto;
pub use sim_env::SimEnv;
pub use sim_transport::{MemoryConnection, MemoryTransport, ServerEndpoint};
