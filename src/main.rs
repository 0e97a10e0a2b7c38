use axum::extract::State;
use axum::middleware;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cricbet_hub::auth::{self, AuthToken};
use cricbet_hub::config::HubConfig;
use cricbet_hub::routes;
use cricbet_hub::state::AppState;

#[tokio::main]
async fn main() {
    // Initialise tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = HubConfig::from_env();
    let bind = cfg.bind.clone();
    let port = cfg.port;
    let token = cfg.token.clone();

    // Acquire the trade store up front: a hub without its store is not
    // worth starting.
    let state = match AppState::new(cfg) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("failed to open trade store: {e}");
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .merge(routes::api_router())
        .route("/health", axum::routing::get(health))
        .layer(middleware::from_fn(auth::require_auth))
        .layer(axum::Extension(AuthToken(token)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .expect("invalid bind address");

    tracing::info!("Cricbet hub listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Server loop is done; release the store explicitly.
    drop(state);
    tracing::info!("Trade store released");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let store_ok = state
        .pool
        .get()
        .ok()
        .map(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok())
        .unwrap_or(false);
    Json(serde_json::json!({
        "status": "ok",
        "store": if store_ok { "ok" } else { "unavailable" },
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, gracefully stopping…");
}
