//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the protocol runtime from the system
//! clock. Two notions of time are needed:
//!
//! - A monotonic instant, for handshake and authentication timeouts.
//! - Wall-clock epoch milliseconds, for envelope `timestamp` fields.
//!
//! The state machine itself takes instants as parameters and never reads a
//! clock. Runtimes read the environment and pass the values in.
//!
//! The environment is implemented twice:
//!
//! 1. `SimEnv` (opensend-harness): manually advanced virtual clock
//! 2. `SystemEnv` (opensend-client): real system clock
//!
//! # Invariants
//!
//! - Monotonicity: `now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::time::Instant;

/// Abstract source of time.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current monotonic time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Instant;

    /// Returns wall-clock milliseconds since the Unix epoch.
    ///
    /// Used only for envelope timestamps. Not required to be monotonic.
    fn unix_millis(&self) -> u64;
}
