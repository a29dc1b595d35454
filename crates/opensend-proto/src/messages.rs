//! Outbound `client:*` message templates.
//!
//! Each variant knows its bare event name and how to build its `data` object.
//! Every payload opens with a fixed `message` string; the remaining keys follow
//! in a fixed order so the digest input is reproducible.

use serde_json::{Map, Value};

use crate::errors::ErrorKind;

/// A message the client can emit, before namespacing and stamping.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Acknowledge `server:connected`
    Connected,
    /// Local application identity
    Information {
        /// Application name
        application: String,
        /// Application version
        version: String,
    },
    /// Supported protocol version window
    Negotiate {
        /// Oldest supported protocol version
        not_before: u32,
        /// Newest supported protocol version
        not_after: u32,
    },
    /// Acknowledge the protocol chosen by the server
    AcknowledgeProtocol {
        /// Protocol identifier, echoed as received
        protocol: Value,
    },
    /// Tell the server we are ready to authenticate
    PromptAuthentication,
    /// Ask the server to sign our challenge
    RequestAuthentication {
        /// Challenge string
        string: String,
    },
    /// Accept or reject the server's answer to our challenge
    AuthenticationAcknowledge {
        /// Whether the answer was accepted
        accept: bool,
    },
    /// Identify the local user
    PreAuthentication {
        /// User identifier
        uuid: String,
    },
    /// Answer a challenge from the server
    Authenticate {
        /// Challenge string as received
        string: String,
        /// Signature over the challenge
        signed: String,
    },
    /// Ask to authenticate after missing the window
    LateAuthenticate,
    /// Generic acknowledgement
    Acknowledge,
    /// Deliver a chat message
    SendMessage {
        /// Recipient identifier
        receiver: String,
        /// Message body
        content: String,
        /// Attachment references
        attachments: Vec<String>,
    },
    /// Fetch pending messages
    GetMessages,
    /// Change presence status
    SetStatus {
        /// New status
        status: String,
    },
    /// Change account settings
    SetSettings {
        /// Whether to send read receipts
        read_receipts: bool,
    },
    /// Block a user
    BlockUser {
        /// User to block
        uuid: String,
    },
    /// Unblock a user
    UnblockUser {
        /// User to unblock
        uuid: String,
    },
    /// Keepalive probe
    Ping,
    /// Answer to `server:ping`
    PingAcknowledge,
    /// Announce disconnect
    Disconnect,
    /// Answer to `server:disconnect`
    DisconnectAcknowledge,
    /// Fetch settings and status
    GetInfo,
    /// Report a rejected inbound frame
    Error(ErrorKind),
}

impl ClientMessage {
    /// Bare event name (without `client:`).
    pub fn event(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Information { .. } => "information",
            Self::Negotiate { .. } => "negotiate",
            Self::AcknowledgeProtocol { .. } => "acknowledge_protocol",
            Self::PromptAuthentication => "prompt_authentication",
            Self::RequestAuthentication { .. } => "request_authentication",
            Self::AuthenticationAcknowledge { .. } => "authentication_acknowledge",
            Self::PreAuthentication { .. } => "pre_authentication",
            Self::Authenticate { .. } => "authenticate",
            Self::LateAuthenticate => "late_authenticate",
            Self::Acknowledge => "acknowledge",
            Self::SendMessage { .. } => "send_message",
            Self::GetMessages => "get_messages",
            Self::SetStatus { .. } => "set_status",
            Self::SetSettings { .. } => "set_settings",
            Self::BlockUser { .. } => "block_user",
            Self::UnblockUser { .. } => "unblock_user",
            Self::Ping => "ping",
            Self::PingAcknowledge => "ping_acknowledge",
            Self::Disconnect => "disconnect",
            Self::DisconnectAcknowledge => "disconnect_acknowledge",
            Self::GetInfo => "get_info",
            Self::Error(_) => "error",
        }
    }

    /// Build the `data` object.
    pub fn data(&self) -> Map<String, Value> {
        match self {
            Self::Connected => fields("I can hear you!", []),
            Self::Information { application, version } => fields(
                "Here's my client information...",
                [("application", application.as_str().into()), ("version", version.as_str().into())],
            ),
            Self::Negotiate { not_before, not_after } => fields(
                "I can support...",
                [("notBefore", (*not_before).into()), ("notAfter", (*not_after).into())],
            ),
            Self::AcknowledgeProtocol { protocol } => {
                fields("Okay. We're using protocol...", [("protocol", protocol.clone())])
            },
            Self::PromptAuthentication => fields("I'm ready to authenticate!", []),
            Self::RequestAuthentication { string } => {
                fields("Sign this string for me...", [("string", string.as_str().into())])
            },
            Self::AuthenticationAcknowledge { accept } => {
                fields("Okay.", [("accept", (*accept).into())])
            },
            Self::PreAuthentication { uuid } => fields("I'm user...", [("uuid", uuid.as_str().into())]),
            Self::Authenticate { string, signed } => fields(
                "Here's the string...",
                [("string", string.as_str().into()), ("signed", signed.as_str().into())],
            ),
            Self::LateAuthenticate => fields("Sorry for being late. Can I authenticate now?", []),
            Self::Acknowledge => fields("Okay.", [("ACK", true.into())]),
            Self::SendMessage { receiver, content, attachments } => fields(
                "Send this message...",
                [
                    ("receiver", receiver.as_str().into()),
                    ("attachments", attachments.clone().into()),
                    ("content", content.as_str().into()),
                ],
            ),
            Self::GetMessages => fields("Can you send me my messages?", []),
            Self::SetStatus { status } => {
                fields("Set my status to...", [("status", status.as_str().into())])
            },
            Self::SetSettings { read_receipts } => {
                fields("Set my settings to...", [("read_receipts", (*read_receipts).into())])
            },
            Self::BlockUser { uuid } => {
                fields("I want to block this user...", [("uuid", uuid.as_str().into())])
            },
            Self::UnblockUser { uuid } => {
                fields("I want to unblock this user...", [("uuid", uuid.as_str().into())])
            },
            Self::Ping => fields("Are you there?", []),
            Self::PingAcknowledge => fields("I'm here!", []),
            Self::Disconnect => fields("I need to disconnect.", []),
            Self::DisconnectAcknowledge => fields("Okay, bye!", []),
            Self::GetInfo => fields("Can you send me my settings and current status?", []),
            Self::Error(kind) => {
                let mut data = Map::new();
                data.insert("error".to_string(), kind.code().into());
                data.insert("message".to_string(), kind.message().into());
                data
            },
        }
    }

    /// Whether this is a post-authentication application message.
    ///
    /// Handshake and authentication messages are emitted by the state machine
    /// itself and cannot be sent through the generic send path.
    pub fn is_application_message(&self) -> bool {
        matches!(
            self,
            Self::Acknowledge
                | Self::SendMessage { .. }
                | Self::GetMessages
                | Self::SetStatus { .. }
                | Self::SetSettings { .. }
                | Self::BlockUser { .. }
                | Self::UnblockUser { .. }
                | Self::Ping
                | Self::GetInfo
        )
    }
}

fn fields<const N: usize>(message: &str, rest: [(&str, Value); N]) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("message".to_string(), message.into());
    for (key, value) in rest {
        data.insert(key.to_string(), value);
    }
    data
}
