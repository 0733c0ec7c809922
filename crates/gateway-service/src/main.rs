//! Owner Gateway
//!
//! Entry point for the local mailbox gateway. Binds the owner context,
//! serves the `/mcp` endpoints and drains the owner on shutdown.

use gateway_service::config::Config;
use gateway_service::dispatcher::Dispatcher;
use gateway_service::observability::metrics::init_metrics_recorder;
use gateway_service::routes::{self, AppState};
use gateway_service::store::{MemoryStore, OwnerStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config is read first so the log format can follow it; failures are
    // reported once tracing is up.
    let config = Config::from_env();
    let log_json = config.as_ref().map_or(false, |c| c.log_json);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_service=debug,slot_engine=info,tower_http=debug".into()),
        )
        .with(log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!log_json).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting Owner Gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        provider_id = %config.provider_id,
        owner = %config.owner_name,
        queue_capacity = config.dispatch_queue_capacity,
        free_busy_interval_minutes = config.free_busy_interval_minutes,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    // The seed is read here so a bad file fails startup instead of the owner.
    let store = match &config.store_seed_path {
        Some(path) => MemoryStore::load(config.owner_name.clone(), path).map_err(|e| {
            error!("Failed to load store seed: {}", e);
            e
        })?,
        None => {
            warn!("No store seed configured, starting with an empty mailbox");
            MemoryStore::new(config.owner_name.clone())
        }
    };

    let dispatcher = Arc::new(Dispatcher::<OwnerStore>::new(
        config.owner_name.clone(),
        config.dispatch_queue_capacity,
    ));
    dispatcher
        .bind(move || Box::new(store) as OwnerStore)
        .map_err(|e| {
            error!("Failed to bind owner context: {}", e);
            e
        })?;

    let bind_address = config.bind_address.clone();
    let drain_seconds = config.drain_seconds;

    let state = Arc::new(AppState::new(config, Arc::clone(&dispatcher)).map_err(|e| {
        error!("Invalid scheduling configuration: {}", e);
        e
    })?);

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Owner Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_seconds))
    .await?;

    dispatcher.unbind().await;

    info!("Owner Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
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
        () = ctrl_c => {}
        () = terminate => {}
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
