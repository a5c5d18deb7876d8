//! px-kvstore server
//!
//! Serves a composed key-value store over HTTP and saves it on shutdown.

use anyhow::Context;
use clap::Parser;
use px_kv::{KvStore, StoreBuilder};
use px_kv_server::{build_router, load_topology, Args};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let spec = load_topology(args.topology.as_deref())?;
    info!("Store topology: {}", spec);

    let store = StoreBuilder::new()
        .base_dir(&args.data_dir)
        .build(&spec)
        .context("Failed to build store")?;
    info!("Loaded {} entries", store.len());

    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("px-kvstore listening on {}", addr);

    axum::serve(listener, build_router(store.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Saving store before exit");
    if let Err(e) = store.flush() {
        error!("Failed to save store: {}", e);
        return Err(e).context("Final flush failed");
    }
    info!("Store saved, bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
