//! Command parsing for the interactive client.
//!
//! This module parses command strings into structured [`Command`] values.
//! Commands start with `/`.

use opensend_proto::ClientMessage;

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Tell the server we are ready to authenticate.
    PromptAuthentication,

    /// Identify the local user.
    PreAuthentication {
        /// User identity.
        uuid: String,
    },

    /// Answer a challenge with its signature.
    Authenticate {
        /// The challenge string.
        string: String,
        /// Signature over the challenge.
        signed: String,
    },

    /// Ask to authenticate after missing the window.
    LateAuthenticate,

    /// Send an application message.
    Send(ClientMessage),

    /// Disconnect and quit.
    Quit,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input string into a command.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "auth" => Command::PromptAuthentication,

        "login" => match parts.get(1) {
            Some(uuid) => Command::PreAuthentication { uuid: (*uuid).to_string() },
            None => usage("login", "Usage: /login <uuid>"),
        },

        "sign" => match (parts.get(1), parts.get(2)) {
            (Some(string), Some(signed)) => Command::Authenticate {
                string: (*string).to_string(),
                signed: (*signed).to_string(),
            },
            _ => usage("sign", "Usage: /sign <string> <signed>"),
        },

        "late" => Command::LateAuthenticate,

        "msg" => match (parts.get(1), parts.get(2..)) {
            (Some(receiver), Some(words)) if !words.is_empty() => {
                Command::Send(ClientMessage::SendMessage {
                    receiver: (*receiver).to_string(),
                    content: words.join(" "),
                    attachments: Vec::new(),
                })
            },
            _ => usage("msg", "Usage: /msg <receiver> <content>"),
        },

        "messages" => Command::Send(ClientMessage::GetMessages),

        "info" => Command::Send(ClientMessage::GetInfo),

        "ping" => Command::Send(ClientMessage::Ping),

        "ack" => Command::Send(ClientMessage::Acknowledge),

        "status" => match parts.get(1..) {
            Some(words) if !words.is_empty() => {
                Command::Send(ClientMessage::SetStatus { status: words.join(" ") })
            },
            _ => usage("status", "Usage: /status <status>"),
        },

        "receipts" => match parts.get(1).copied() {
            Some("on") => Command::Send(ClientMessage::SetSettings { read_receipts: true }),
            Some("off") => Command::Send(ClientMessage::SetSettings { read_receipts: false }),
            _ => usage("receipts", "Usage: /receipts on|off"),
        },

        "block" => match parts.get(1) {
            Some(uuid) => Command::Send(ClientMessage::BlockUser { uuid: (*uuid).to_string() }),
            None => usage("block", "Usage: /block <uuid>"),
        },

        "unblock" => match parts.get(1) {
            Some(uuid) => Command::Send(ClientMessage::UnblockUser { uuid: (*uuid).to_string() }),
            None => usage("unblock", "Usage: /unblock <uuid>"),
        },

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

fn usage(command: &str, error: &str) -> Command {
    Command::InvalidArgs { command: command.into(), error: error.into() }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_send_message() {
        assert_eq!(
            parse("/msg bob hello   there"),
            Command::Send(ClientMessage::SendMessage {
                receiver: "bob".into(),
                content: "hello there".into(),
                attachments: vec![],
            })
        );
    }

    #[test]
    fn parse_send_message_missing_content() {
        assert!(matches!(parse("/msg bob"), Command::InvalidArgs { command, .. } if command == "msg"));
    }

    #[test]
    fn parse_authentication_commands() {
        assert_eq!(parse("/auth"), Command::PromptAuthentication);
        assert_eq!(parse("/login alice"), Command::PreAuthentication { uuid: "alice".into() });
        assert_eq!(
            parse("/sign abc def"),
            Command::Authenticate { string: "abc".into(), signed: "def".into() }
        );
        assert_eq!(parse("/late"), Command::LateAuthenticate);
        assert!(matches!(parse("/sign abc"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_settings() {
        assert_eq!(
            parse("/receipts off"),
            Command::Send(ClientMessage::SetSettings { read_receipts: false })
        );
        assert!(matches!(parse("/receipts maybe"), Command::InvalidArgs { .. }));
        assert_eq!(
            parse("/status out to lunch"),
            Command::Send(ClientMessage::SetStatus { status: "out to lunch".into() })
        );
    }

    #[test]
    fn parse_quit() {
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/q"), Command::Quit);
    }

    #[test]
    fn parse_unknown() {
        assert!(matches!(parse("/dance"), Command::Unknown { .. }));
        assert!(matches!(parse("hello"), Command::Unknown { .. }));
        assert!(matches!(parse(""), Command::Unknown { .. }));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(input in ".{0,64}") {
            let _ = parse(&input);
        }

        #[test]
        fn prop_plain_text_is_unknown(input in "[a-z ]{1,32}") {
            prop_assert!(matches!(parse(&input), Command::Unknown { .. }), "{input:?}");
        }
    }
}
