//! Command-line client for publish/subscribe messaging over NATS `JetStream`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod args;
mod commands;
mod error;

use args::Args;
use error::Error;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use pubsub_broker::{IdKind, validate_id};
use pubsub_broker_nats::{NatsBroker, NatsBrokerOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let shutdown_token = CancellationToken::new();

    // One-shot commands keep the default handler so an interrupt still kills them
    if args.command.is_long_running() {
        let signal_shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            eprintln!("Received interrupt signal. Shutting down...");
            signal_shutdown_token.cancel();
        });
    }

    match run(args, &shutdown_token).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    args: Args,
    shutdown: &CancellationToken,
) -> Result<(), Error<pubsub_broker_nats::Error>> {
    let project = args.command.project().to_string();
    validate_id(IdKind::Project, &project)?;

    let broker = NatsBroker::connect(NatsBrokerOptions {
        url: args.nats_url,
        project,
        credentials_file: args.nats_creds,
        connect_timeout: Duration::from_secs(args.connect_timeout),
    })
    .await
    .map_err(Error::Connect)?;

    commands::execute(broker, args.command, &mut std::io::stdout(), shutdown).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "failed to install signal handlers, falling back to ctrl-c");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // without a handler the process can only be killed, so never cancel
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Received interrupt signal");
}
