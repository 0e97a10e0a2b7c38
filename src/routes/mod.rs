pub mod klines;
pub mod trade;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble the API router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new().merge(klines::routes()).merge(trade::routes())
}
