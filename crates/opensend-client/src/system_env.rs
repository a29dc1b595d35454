//! Production Environment implementation.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use opensend_core::env::Environment;

/// Environment backed by the system clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        // A clock set before 1970 stamps zero rather than failing the send
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
    }
}
