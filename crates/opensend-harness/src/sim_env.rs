//! Manually advanced Environment implementation for deterministic testing.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use opensend_core::env::Environment;

/// Simulation environment with a virtual clock.
///
/// Time only moves when a test calls [`SimEnv::advance`]. Both the monotonic
/// instant and the epoch milliseconds move together, so envelope timestamps
/// are reproducible across runs.
///
/// Clones share the same clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    clock: Arc<Mutex<SimClock>>,
}

#[derive(Debug)]
struct SimClock {
    origin: Instant,
    origin_millis: u64,
    elapsed: Duration,
}

impl SimEnv {
    /// Epoch milliseconds at virtual time zero (2023-11-14T22:13:20Z).
    pub const DEFAULT_EPOCH_MILLIS: u64 = 1_700_000_000_000;

    /// Create a new SimEnv starting at [`Self::DEFAULT_EPOCH_MILLIS`]
    pub fn new() -> Self {
        Self::starting_at(Self::DEFAULT_EPOCH_MILLIS)
    }

    /// Create a new SimEnv whose wall clock starts at `epoch_millis`
    pub fn starting_at(epoch_millis: u64) -> Self {
        Self {
            clock: Arc::new(Mutex::new(SimClock {
                origin: Instant::now(),
                origin_millis: epoch_millis,
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, duration: Duration) {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner).elapsed += duration;
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner).elapsed
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        let clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        clock.origin + clock.elapsed
    }

    fn unix_millis(&self) -> u64 {
        let clock = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        clock.origin_millis + clock.elapsed.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_env_time_advances() {
        let env = SimEnv::new();
        let start = env.now();
        assert_eq!(env.unix_millis(), SimEnv::DEFAULT_EPOCH_MILLIS);

        env.advance(Duration::from_secs(5));

        assert_eq!(env.now() - start, Duration::from_secs(5));
        assert_eq!(env.unix_millis(), SimEnv::DEFAULT_EPOCH_MILLIS + 5_000);
    }

    #[test]
    fn sim_env_time_stands_still() {
        let env = SimEnv::starting_at(42);
        assert_eq!(env.now(), env.now());
        assert_eq!(env.unix_millis(), 42);
    }

    #[test]
    fn sim_env_clones_share_clock() {
        let env1 = SimEnv::new();
        let env2 = env1.clone();
        env1.advance(Duration::from_millis(250));
        assert_eq!(env2.elapsed(), Duration::from_millis(250));
        assert_eq!(env1.now(), env2.now());
    }
}
