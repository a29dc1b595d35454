//! Client configuration from command-line arguments.

use std::time::Duration;

use clap::Parser;
use opensend_core::{
    codec::CodecConfig,
    connection::ConnectionConfig,
    identity::{ApplicationIdentity, ProtocolWindow},
    transport::server_address,
};

use crate::{ClientError, RuntimeOptions, TrustedServers};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "opensend-client")]
#[command(about = "Connect to an OpenSend messaging server")]
pub struct Args {
    /// Server host (and optional port/path), e.g. `chat.example.org`
    #[arg(long)]
    pub server: String,

    /// URL scheme
    #[arg(long, default_value = "wss")]
    pub scheme: String,

    /// Application name announced to the server
    #[arg(long, default_value = env!("CARGO_PKG_NAME"))]
    pub app_name: String,

    /// Application version announced to the server
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// Oldest supported protocol version
    #[arg(long, default_value_t = 1)]
    pub not_before: u32,

    /// Newest supported protocol version
    #[arg(long, default_value_t = 1)]
    pub not_after: u32,

    /// Handshake timeout in seconds (0 disables)
    #[arg(long, default_value_t = 30)]
    pub handshake_timeout: u64,

    /// Authentication timeout in seconds (0 disables)
    #[arg(long, default_value_t = 60)]
    pub authentication_timeout: u64,

    /// Reject server envelopes that carry no integrity hash
    #[arg(long)]
    pub require_inbound_hash: bool,

    /// Prompt the server to authenticate as soon as the handshake completes
    #[arg(long)]
    pub prompt_authentication: bool,

    /// Trust a server's challenge signature, as `<uuid>=<signature>` (repeatable)
    #[arg(long = "trust-server", value_name = "UUID=SIGNATURE")]
    pub trust_server: Vec<String>,

    /// Accept challenge answers from servers not listed with `--trust-server`
    #[arg(long)]
    pub accept_unverified: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Everything needed to start a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `scheme://host` passed to the transport
    pub address: String,
    /// What we announce about ourselves
    pub identity: ApplicationIdentity,
    /// Connection timeouts
    pub connection: ConnectionConfig,
    /// Envelope codec settings
    pub codec: CodecConfig,
    /// Runtime behavior
    pub runtime: RuntimeOptions,
    /// Checks the server's challenge answers
    pub verifier: TrustedServers,
}

impl ClientConfig {
    /// Build a configuration from parsed arguments.
    pub fn from_args(args: &Args) -> Result<Self, ClientError> {
        let window = ProtocolWindow::new(args.not_before, args.not_after)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        if args.server.is_empty() {
            return Err(ClientError::Config("server host must not be empty".to_string()));
        }

        let mut verifier = TrustedServers::default().accept_unverified(args.accept_unverified);
        for entry in &args.trust_server {
            let (uuid, signed) = entry
                .split_once('=')
                .filter(|(uuid, signed)| !uuid.is_empty() && !signed.is_empty())
                .ok_or_else(|| {
                    ClientError::Config(format!(
                        "invalid --trust-server `{entry}`, expected <uuid>=<signature>"
                    ))
                })?;
            verifier = verifier.trust(uuid, signed);
        }

        Ok(Self {
            address: server_address(&args.scheme, &args.server),
            identity: ApplicationIdentity::new(&args.app_name, &args.app_version, window),
            connection: ConnectionConfig {
                handshake_timeout: seconds(args.handshake_timeout),
                authentication_timeout: seconds(args.authentication_timeout),
            },
            codec: CodecConfig {
                require_inbound_hash: args.require_inbound_hash,
                ..CodecConfig::default()
            },
            runtime: RuntimeOptions {
                prompt_authentication: args.prompt_authentication,
                ..RuntimeOptions::default()
            },
            verifier,
        })
    }
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("opensend-client").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::from_args(&parse(&["--server", "chat.example.org"])).unwrap();
        assert_eq!(config.address, "wss://chat.example.org");
        assert_eq!(config.identity.window, ProtocolWindow::default());
        assert_eq!(config.connection, ConnectionConfig::default());
        assert_eq!(config.codec, CodecConfig::default());
        assert!(!config.runtime.prompt_authentication);
        assert_eq!(config.verifier, TrustedServers::default());
    }

    #[test]
    fn trusted_servers_are_collected() {
        let args = parse(&[
            "--server",
            "h",
            "--trust-server",
            "srv-1=sig-1",
            "--trust-server",
            "srv-2=a=b",
            "--accept-unverified",
        ]);
        let config = ClientConfig::from_args(&args).unwrap();
        let expected = TrustedServers::default()
            .accept_unverified(true)
            .trust("srv-1", "sig-1")
            .trust("srv-2", "a=b");
        assert_eq!(config.verifier, expected);
    }

    #[test]
    fn malformed_trust_entries_are_rejected() {
        for entry in ["srv-1", "=sig", "srv-1="] {
            let args = parse(&["--server", "h", "--trust-server", entry]);
            assert!(
                matches!(ClientConfig::from_args(&args), Err(ClientError::Config(_))),
                "{entry} should be rejected"
            );
        }
    }

    #[test]
    fn zero_disables_timeouts() {
        let args = parse(&[
            "--server",
            "localhost:8080",
            "--scheme",
            "ws",
            "--handshake-timeout",
            "0",
            "--authentication-timeout",
            "0",
        ]);
        let config = ClientConfig::from_args(&args).unwrap();
        assert_eq!(config.address, "ws://localhost:8080");
        assert_eq!(config.connection.handshake_timeout, None);
        assert_eq!(config.connection.authentication_timeout, None);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let args = parse(&["--server", "h", "--not-before", "3", "--not-after", "2"]);
        assert!(matches!(ClientConfig::from_args(&args), Err(ClientError::Config(_))));
    }

    #[test]
    fn server_is_required() {
        assert!(Args::try_parse_from(["opensend-client"]).is_err());
    }
}
