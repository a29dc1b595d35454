//! WebSocket transport.
//!
//! Text frames carry envelopes. Control frames are handled by tungstenite;
//! binary frames are not part of the protocol and are dropped.

use std::io;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use opensend_core::transport::{Transport, TransportConnection};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, trace};

/// Opens WebSocket connections (`ws://` or `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn connect(&self, address: &str) -> io::Result<Self::Connection> {
        let (stream, response) = connect_async(address).await.map_err(into_io)?;
        debug!(address, status = %response.status(), "websocket upgraded");
        Ok(WebSocketConnection { stream })
    }
}

/// An open WebSocket.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> io::Result<()> {
        self.stream.send(Message::Text(text.into())).await.map_err(into_io)
    }

    async fn recv_text(&mut self) -> io::Result<Option<String>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server sent close frame");
                    return Ok(None);
                },
                Ok(other) => trace!(len = other.len(), "ignoring non-text frame"),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                },
                Err(err) => return Err(into_io(err)),
            }
        }
        Ok(None)
    }

    async fn close(&mut self, reason: &str) -> io::Result<()> {
        let frame = CloseFrame { code: CloseCode::Normal, reason: reason.to_owned().into() };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            },
            Err(err) => Err(into_io(err)),
        }
    }
}

fn into_io(err: tungstenite::Error) -> io::Error {
    match err {
        tungstenite::Error::Io(err) => err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            io::Error::new(io::ErrorKind::NotConnected, err.to_string())
        },
        other => io::Error::other(other.to_string()),
    }
}
