use axum::Router;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backtest_query_api::config::AppConfig;
use backtest_query_api::store::{DocumentStore, MongoStore};
use backtest_query_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backtest_query_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting backtest query API...");

    let config = AppConfig::load()?;

    // One client for the whole process; the driver pools connections per query
    let store = MongoStore::connect(&config.store).await?;

    match tokio::time::timeout(config.store.query_timeout(), store.ping()).await {
        Ok(Ok(())) => info!("Store reachable"),
        Ok(Err(e)) => error!("Store ping failed: {}. Continuing; queries will report it...", e),
        Err(_) => error!(
            "Store ping timed out after {}ms. Continuing; queries will report it...",
            config.store.query_timeout_ms
        ),
    }

    let state = AppState::new(Arc::new(store), config.store.query_timeout());
    let api = build_router(state);

    let app = match config.server.mount_path() {
        Some(path) => {
            info!("Serving queries under {}", path);
            Router::new().nest(&path, api)
        }
        None => api,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
