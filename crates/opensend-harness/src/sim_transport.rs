//! In-memory Transport implementation over tokio channels.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use opensend_core::transport::{Transport, TransportConnection};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Something the client put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// A text message
    Text(String),
    /// The client closed the channel with this reason
    Close(String),
}

/// Simulation transport backed by unbounded channels.
///
/// Every [`MemoryTransport::listen`] queues one connection; each
/// [`Transport::connect`] call consumes the oldest queued one. Connecting with
/// nothing queued fails with `ConnectionRefused`, which is how tests model an
/// unreachable server.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pending: Mutex<VecDeque<MemoryConnection>>,
    addresses: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    /// Create a transport with nothing listening.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection and return the server's end of it.
    pub fn listen(&self) -> ServerEndpoint {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).push_back(MemoryConnection {
            inbound,
            outbound,
            closed: false,
        });
        ServerEndpoint { to_client: Some(to_client), from_client }
    }

    /// Every address passed to `connect`, in order.
    pub fn addresses(&self) -> Vec<String> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    async fn connect(&self, address: &str) -> io::Result<Self::Connection> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner).push(address.to_string());
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, format!("nothing listening at {address}"))
        })
    }
}

/// Client end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    inbound: UnboundedReceiver<String>,
    outbound: UnboundedSender<ClientFrame>,
    closed: bool,
}

#[async_trait]
impl TransportConnection for MemoryConnection {
    async fn send_text(&mut self, text: String) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        self.outbound
            .send(ClientFrame::Text(text))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "server endpoint dropped"))
    }

    async fn recv_text(&mut self) -> io::Result<Option<String>> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self, reason: &str) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            self.inbound.close();
            // Server may already be gone
            let _ = self.outbound.send(ClientFrame::Close(reason.to_string()));
        }
        Ok(())
    }
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct ServerEndpoint {
    to_client: Option<UnboundedSender<String>>,
    from_client: UnboundedReceiver<ClientFrame>,
}

impl ServerEndpoint {
    /// Deliver text to the client. Returns false if the client is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_client.as_ref().is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Wait for the next client frame; `None` once the client is dropped.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Close the server side; the client then reads end-of-stream.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }
}
