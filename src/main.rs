//! Vigil — main application entry point
//!
//! Starts the HTTP API server.

use std::net::SocketAddr;

use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

use vigil::{Config, create_app, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize rustls crypto provider before any TLS operations
    let _ = rustls::crypto::ring::default_provider().install_default();

    run_server().await
}

async fn run_server() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let config = Config::load()?;
    init_tracing(&config.logging)?;

    tracing::info!("Starting vigil scan service...");
    tracing::info!(
        "Configuration loaded: server={}:{}, max_concurrent_scans={}",
        config.server.host,
        config.server.port,
        config.scan.max_concurrent_scans
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_app(config)?;
    let shutdown_token = app.shutdown_token.clone();

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await?;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM and cancels background tasks.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    token.cancel();
}
