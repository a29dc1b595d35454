//! Transport abstraction for persistent text channels.
//!
//! The protocol runs over any bidirectional channel that carries whole text
//! messages (a WebSocket in production, in-memory queues in tests). The core
//! never opens sockets itself; the runtime drives one of these.

use std::io;

use async_trait::async_trait;

/// Abstract transport able to open a text channel to a server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Type representing an open channel.
    type Connection: TransportConnection;

    /// Connect to a remote endpoint.
    ///
    /// `address` has the form `scheme://host`; see [`server_address`].
    async fn connect(&self, address: &str) -> io::Result<Self::Connection>;
}

/// An open, message-oriented text channel.
#[async_trait]
pub trait TransportConnection: Send + 'static {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> io::Result<()>;

    /// Receive the next text message.
    ///
    /// Returns `Ok(None)` once the peer has closed the channel.
    async fn recv_text(&mut self) -> io::Result<Option<String>>;

    /// Close the channel with a human-readable reason.
    async fn close(&mut self, reason: &str) -> io::Result<()>;
}

/// Build a server address from a scheme and host.
///
/// The host is not parsed or validated; it is passed to the transport as-is.
pub fn server_address(scheme: &str, host: &str) -> String {
    format!("{scheme}://{host}")
}
