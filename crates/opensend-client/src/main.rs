//! OpenSend command-line client.
//!
//! Reads slash commands from stdin (`/login`, `/sign`, `/msg`, `/quit`, ...)
//! and drives one connection to the configured server.

use clap::Parser;
use opensend_client::{
    Args, ClientConfig, ClientError, Command, Runtime, SystemEnv, WebSocketTransport, commands,
};
use opensend_core::{codec::EnvelopeCodec, connection::Connection};
use opensend_crypto::SystemCrypto;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(&args).await {
        error!(%err, "client failed");
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), ClientError> {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("a TLS crypto provider was already installed");
    }

    let config = ClientConfig::from_args(args)?;
    let codec = EnvelopeCodec::new(SystemCrypto, config.codec.clone());
    let connection = Connection::new(config.identity.clone(), codec, config.connection.clone());
    if config.verifier.is_empty() && !args.accept_unverified {
        warn!("no --trust-server given; every challenge answer will be rejected");
    }

    let runtime = Runtime::connect(
        &WebSocketTransport,
        &config.address,
        connection,
        SystemEnv,
        config.verifier.clone(),
        config.runtime.clone(),
    )
    .await?;

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(read_commands(tx));

    let state = runtime.run(rx).await?;
    info!(?state, "connection finished");
    Ok(())
}

/// Forward stdin lines and ctrl-c to the runtime as commands.
async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let command = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => commands::parse(&line),
                Ok(None) => Command::Quit,
                Err(err) => {
                    warn!(%err, "failed to read stdin");
                    Command::Quit
                },
            },
            _ = tokio::signal::ctrl_c() => Command::Quit,
        };

        let quit = command == Command::Quit;
        if tx.send(command).await.is_err() || quit {
            return;
        }
    }
}
