//! Inbound `server:*` event vocabulary.

use std::fmt;

/// Events the server may send, by bare name (namespace already stripped).
///
/// Names the client does not understand are kept as [`ServerEvent::Unhandled`]
/// so the dispatcher can answer them without a catch-all string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerEvent {
    /// Server heard our connection (`server:connected`)
    Connected,
    /// Server identity and MOTD (`server:information`)
    Information,
    /// Server asks which protocol versions we support (`server:negotiate`)
    Negotiate,
    /// Server picks the protocol (`server:set_protocol`)
    SetProtocol,
    /// Server starts authentication with its identity (`server:pre_authentication`)
    PreAuthentication,
    /// Authentication start, or the answer to our challenge (`server:authenticate`)
    Authenticate,
    /// Keepalive probe (`server:ping`)
    Ping,
    /// Server is closing the session (`server:disconnect`)
    Disconnect,
    /// Server reports an error about something we sent (`server:error`)
    Error,
    /// Any other name
    Unhandled(String),
}

impl ServerEvent {
    /// Every named event, excluding [`ServerEvent::Unhandled`].
    pub const KNOWN: [ServerEvent; 9] = [
        Self::Connected,
        Self::Information,
        Self::Negotiate,
        Self::SetProtocol,
        Self::PreAuthentication,
        Self::Authenticate,
        Self::Ping,
        Self::Disconnect,
        Self::Error,
    ];

    /// Classify a bare event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "connected" => Self::Connected,
            "information" => Self::Information,
            "negotiate" => Self::Negotiate,
            "set_protocol" => Self::SetProtocol,
            "pre_authentication" => Self::PreAuthentication,
            "authenticate" => Self::Authenticate,
            "ping" => Self::Ping,
            "disconnect" => Self::Disconnect,
            "error" => Self::Error,
            other => Self::Unhandled(other.to_string()),
        }
    }

    /// Bare event name.
    pub fn name(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Information => "information",
            Self::Negotiate => "negotiate",
            Self::SetProtocol => "set_protocol",
            Self::PreAuthentication => "pre_authentication",
            Self::Authenticate => "authenticate",
            Self::Ping => "ping",
            Self::Disconnect => "disconnect",
            Self::Error => "error",
            Self::Unhandled(name) => name,
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server:{}", self.name())
    }
}
