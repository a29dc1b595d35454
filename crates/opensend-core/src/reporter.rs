//! Protocol-level error reporting.
//!
//! The dispatcher returns a [`Rejection`] when an inbound event cannot be
//! applied. The reporter turns it into a `client:error` reply; the connection
//! state is never touched on this path.

use opensend_proto::{ClientMessage, ErrorKind, ProtocolError};
use thiserror::Error;

use crate::connection::{ConnectionAction, ConnectionState};

/// Why an inbound event was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Known event, wrong state
    #[error("`server:{event}` is not legal in state {state:?}")]
    Violation {
        /// Bare event name
        event: String,
        /// State the connection was in
        state: ConnectionState,
    },

    /// Required payload field absent
    #[error("`server:{event}` payload is missing `{field}`")]
    MissingField {
        /// Bare event name
        event: String,
        /// Name of the missing field
        field: &'static str,
    },

    /// Envelope or payload could not be interpreted
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Event outside the known vocabulary
    #[error("no handler for `server:{event}`")]
    Unhandled {
        /// Bare event name
        event: String,
    },

    /// Local failure while handling an otherwise valid event
    #[error("internal failure: {0}")]
    Internal(String),
}

impl Rejection {
    /// Error kind reported to the peer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Violation { .. } => ErrorKind::Violation,
            Self::MissingField { .. } => ErrorKind::InvalidData,
            Self::Protocol(err) => err.error_kind().unwrap_or(ErrorKind::InvalidData),
            Self::Unhandled { .. } | Self::Internal(_) => ErrorKind::Unknown,
        }
    }
}

/// The `client:error` reply for an error kind.
pub fn report(kind: ErrorKind) -> ConnectionAction {
    ConnectionAction::Send(ClientMessage::Error(kind))
}
