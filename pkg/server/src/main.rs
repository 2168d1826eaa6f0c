use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use gossip::{Discovery, GossipService, ServiceEvent};
use server::config::Cli;
use server::services::Services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)?;

    let configured_name = if cli.node_name.is_empty() { None } else { Some(cli.node_name.clone()) };
    let self_name = configured_name.clone().unwrap_or_else(gossip::node::name_generator);

    let (lookup_tx, mut lookup_rx) = mpsc::channel::<String>(256);
    let services = Services::new(&cli, cli.bind_addr, self_name.clone(), lookup_tx);

    // spec.md §4.I: a fresh resolver entry's broadcast request is meant to
    // go out over gossip; this node has no document-lookup wire message of
    // its own yet, so the broadcast is only logged for now.
    tokio::spawn(async move {
        while let Some(path) = lookup_rx.recv().await {
            tracing::debug!(%path, "endpoint lookup broadcast requested");
        }
    });

    let discovery = Discovery::new(
        cli.cluster_name.clone(),
        configured_name,
        cli.bind_addr,
        cli.http_port,
        cli.binary_port,
        cli.region,
        std::process::id(),
    );
    let gossip_group = SocketAddrV4::new(cli.gossip_group, cli.gossip_port);
    let gossip_service = GossipService::bind(cli.bind_addr, gossip_group, discovery).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (events_tx, mut events_rx) = mpsc::channel::<ServiceEvent>(32);

    let gossip_shutdown = shutdown_tx.clone();
    let gossip_shutdown_rx = shutdown_rx.clone();
    let gossip_handle = tokio::spawn(async move {
        if let Err(err) = gossip_service.run(events_tx, gossip_shutdown_rx).await {
            tracing::error!(%err, "gossip service exited");
        }
        let _ = gossip_shutdown.send(true);
    });

    let events_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ServiceEvent::Renamed(name) => tracing::info!(new_name = %name, "node renamed after SNEER"),
                ServiceEvent::ShutdownRequested => {
                    tracing::warn!("configured node name collided with an active cluster member, shutting down");
                    let _ = events_shutdown.send(true);
                }
            }
        }
    });

    tokio::spawn(services.clone().run_raft_ticker(shutdown_rx.clone()));

    let http_listener = TcpListener::bind((cli.bind_addr, cli.http_port)).await?;
    tracing::info!(port = cli.http_port, "http listener bound");
    let http_services = services.clone();
    let mut http_shutdown = shutdown_rx.clone();
    let http_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = http_listener.accept() => {
                    let Ok((stream, peer)) = accepted else { continue };
                    let services = http_services.clone();
                    tokio::spawn(async move { server::connection::serve_http(stream, peer, services).await });
                }
                _ = http_shutdown.changed() => {
                    if *http_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    let binary_listener = TcpListener::bind((cli.bind_addr, cli.binary_port)).await?;
    tracing::info!(port = cli.binary_port, "binary listener bound");
    let binary_services = services.clone();
    let mut binary_shutdown = shutdown_rx.clone();
    let binary_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = binary_listener.accept() => {
                    let Ok((stream, peer)) = accepted else { continue };
                    let services = binary_services.clone();
                    tokio::spawn(async move { server::connection::serve_binary(stream, peer, services).await });
                }
                _ = binary_shutdown.changed() => {
                    if *binary_shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    // Two-stage shutdown (spec.md §4.K): the first Ctrl-C starts a graceful
    // drain window; a second one before the window elapses forces an
    // immediate exit instead of waiting out the grace period.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, draining");
        }
        _ = wait_for_shutdown(shutdown_rx.clone()) => {
            tracing::info!("shutdown triggered by cluster event");
        }
    }
    let _ = shutdown_tx.send(true);

    let grace = cli.shutdown_grace();
    let forced = tokio::select! {
        _ = tokio::time::sleep(grace) => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    http_handle.abort();
    binary_handle.abort();

    // gossip's run() reacts to the same shutdown signal by sending BYE
    // (spec.md §4.K) before returning, so give it a short window to do so
    // instead of aborting it outright.
    if tokio::time::timeout(Duration::from_secs(1), gossip_handle).await.is_err() {
        tracing::warn!("gossip service did not exit within the grace window");
    }

    if forced {
        tracing::warn!("second interrupt received, forcing immediate exit");
        std::process::exit(1);
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
