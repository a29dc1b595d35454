//! Oracle functions for scenario verification.
//!
//! Oracle functions run at the end of scenarios to verify global consistency.
//! They receive a snapshot of the entire world state and assert invariants.

use opensend_core::connection::ConnectionState;
use opensend_proto::ErrorKind;

use crate::scenario::World;

/// Oracle function type.
///
/// Receives immutable reference to world state and returns:
/// - `Ok(())` if all invariants hold
/// - `Err(message)` if verification fails
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Create an oracle that verifies the final connection state.
pub fn in_state(expected: ConnectionState) -> OracleFn {
    Box::new(move |world| {
        if world.state() == expected {
            Ok(())
        } else {
            Err(format!("expected state {expected:?}, got {:?}", world.state()))
        }
    })
}

/// Create an oracle that verifies the exact sequence of sent events.
pub fn sent_events(expected: Vec<&'static str>) -> OracleFn {
    Box::new(move |world| {
        let sent = world.sent_events();
        if sent == expected {
            Ok(())
        } else {
            Err(format!("expected sent events {expected:?}, got {sent:?}"))
        }
    })
}

/// Create an oracle that verifies the exact sequence of reported errors.
pub fn reported_errors(expected: Vec<ErrorKind>) -> OracleFn {
    Box::new(move |world| {
        let reported = world.reported_errors();
        if reported == expected {
            Ok(())
        } else {
            Err(format!("expected reported errors {expected:?}, got {reported:?}"))
        }
    })
}

/// Create an oracle that verifies every sent envelope carries a valid hash.
pub fn all_hashes_valid() -> OracleFn {
    Box::new(|world| match world.sent().iter().find(|message| !message.hash_valid) {
        None => Ok(()),
        Some(message) => Err(format!("client:{} carries an invalid hash", message.event)),
    })
}

/// Create an oracle that verifies the client asked for the transport to close.
pub fn closed() -> OracleFn {
    Box::new(|world| {
        if world.closed_reason().is_some() {
            Ok(())
        } else {
            Err("connection was never closed".to_string())
        }
    })
}

/// Create an oracle that verifies no local operation failed.
pub fn no_local_errors() -> OracleFn {
    Box::new(|world| match world.local_errors() {
        [] => Ok(()),
        errors => Err(format!("local operations failed: {errors:?}")),
    })
}

/// Combine multiple oracles into one.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        for oracle in oracles {
            oracle(world)?;
        }
        Ok(())
    })
}
