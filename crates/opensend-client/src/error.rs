//! Client error types.

use std::io;

use opensend_core::error::ConnectionError;
use thiserror::Error;

/// Errors surfaced by the client runtime.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Could not open the transport
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address we tried
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Transport failed while running
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Connection state machine rejected an operation
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
