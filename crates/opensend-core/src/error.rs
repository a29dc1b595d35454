//! Error types for the OpenSend protocol core.
//!
//! These are *local* errors: misuse of the connection API, timeouts, and
//! envelopes that cannot be built. Problems with what the server sent are not errors at
//! this level; they become `client:error` replies (see [`crate::reporter`]).

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// Message cannot be sent through the application send path
    #[error("`{event}` is not an application message")]
    NotApplicationMessage {
        /// Bare event name of the rejected message
        event: &'static str,
    },

    /// Protocol version window is inverted
    #[error("invalid protocol window: notBefore {not_before} is after notAfter {not_after}")]
    InvalidWindow {
        /// Oldest supported version
        not_before: u32,
        /// Newest supported version
        not_after: u32,
    },

    /// Handshake did not complete within timeout
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Authentication did not complete within timeout
    #[error("authentication timeout after {elapsed:?}")]
    AuthenticationTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Envelope could not be built
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<opensend_proto::ProtocolError> for ConnectionError {
    fn from(err: opensend_proto::ProtocolError) -> Self {
        ConnectionError::Protocol(err.to_string())
    }
}
