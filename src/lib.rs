use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Uri},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod backtest; // Backtest info, history and strategy queries
pub mod config;
pub mod error;
pub mod records;
pub mod store; // Document store access (MongoDB, in-memory)

use error::ApiError;
use store::{DocumentStore, Operation};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    store: String,
}

// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match store::with_deadline(
        Operation::Ping,
        state.query_timeout,
        state.store.ping(),
    )
    .await
    {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Store ping failed: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
    })
}

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Backtest</title>
  </head>
  <body>
    <h1>Backtest</h1>
    <p>Query endpoints: /info, /info_strategy, /info_all, /info_code, /info_cookie, /history, /strategy</p>
  </body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

pub fn build_router(state: AppState) -> Router {
    use backtest::handlers;

    // Fixed headers every query response carries
    let json_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("X-Requested-With"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("PUT,POST,GET,DELETE,OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("3.2.1"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf-8"),
        ));

    Router::new()
        .route("/health", get(health_check))
        // Backtest info (backtest_info collection)
        .route("/info", get(handlers::info_by_user))
        .route("/info_strategy", get(handlers::info_by_strategy))
        .route("/info_all", get(handlers::info_all))
        .route("/info_code", get(handlers::info_by_code))
        .route("/info_cookie", get(handlers::info_by_cookie))
        // History and strategies, keyed by session cookie
        .route("/history", get(handlers::history_by_cookie))
        .route("/strategy", get(handlers::strategy_by_cookie))
        .fallback(not_found)
        .layer(json_headers)
        // The index page is HTML and sits outside the JSON header layer
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
