//! Scenario testing framework for deterministic simulation tests.
//!
//! This module provides a declarative API for writing scenario-based tests
//! that follow the Oracle Pattern. A scenario is a list of [`Step`]s (server
//! frames, local operations, clock advances) executed against one simulated
//! connection. Every action the connection emits is executed and recorded in
//! the [`World`], and the mandatory oracle verifies the final state.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use oracle::OracleFn;
pub use world::{SentMessage, Verification, World};
