mod cli;
mod control;
mod discovery;
mod kubernetes;
mod mirror;
mod parser;
mod server;
mod tailer;
mod types;
mod validator;

use anyhow::Context;
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info};

use cli::Cli;
use control::ControlLoop;
use kubernetes::KubeCluster;
use types::MirrorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = MirrorConfig::from(&cli);

    let ready = Arc::new(AtomicBool::new(false));
    let probe_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(cli.probe_port, probe_ready).await {
            error!("probe server error: {:#}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("failed to build cluster client")?;
    let cluster = KubeCluster::new(client);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(handle_signals(shutdown_tx));

    ready.store(true, Ordering::Relaxed);
    info!("started sealed-secrets mirror");

    let outcome = ControlLoop::new(cluster, config, shutdown_rx)?.run().await;
    info!("terminated sealed-secrets mirror");
    outcome
}

/// Translate SIGTERM or an interrupt into the draining transition.
async fn handle_signals(shutdown: watch::Sender<bool>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, terminating..."),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("received interrupt, terminating..."),
            Err(e) => error!("failed to listen for interrupt: {}", e),
        },
    }
    let _ = shutdown.send(true);
}
