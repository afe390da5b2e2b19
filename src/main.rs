//! gather-gateway server entry point.
//!
//! Loads configuration, selects the store, starts the invalidation
//! listener and serves the REST API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use gather_gateway::api;
use gather_gateway::app_state::AppState;
use gather_gateway::cache::{CacheStore, InvalidationListener, MemoryCache};
use gather_gateway::config::GatewayConfig;
use gather_gateway::domain::{EventBus, ThreadRandom};
use gather_gateway::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting gather-gateway");

    // Authoritative store
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(url)
                .await
                .context("connecting to PostgreSQL")?;
            let store = PostgresStore::new(pool);
            store.migrate().await.context("running migrations")?;
            tracing::info!("using PostgreSQL store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Cache and invalidation transport
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let event_bus = EventBus::new(config.event_bus_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener_task = InvalidationListener::new(Arc::clone(&cache), &config.invalidation)
        .spawn(&event_bus, shutdown_rx);

    // Build application
    let state = AppState::new(
        store,
        cache,
        Arc::new(event_bus),
        Arc::new(ThreadRandom),
        &config,
    );
    let app = api::build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = listener_task.await;
    Ok(())
}
