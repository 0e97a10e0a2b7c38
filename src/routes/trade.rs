use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::trades;
use crate::error::HubError;
use crate::market::Market;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/trade", post(api_trade))
        .route("/api/trades", get(api_recent_trades))
}

/// POST /api/trade — validate and append one trade, then trigger kline
/// recomputation for the market.
///
/// The append commits before the refresh is requested.  Under the
/// immediate policy a refresh error therefore surfaces as a server error
/// for a trade that was already durably stored; "trade accepted" and
/// "views refreshed" are separate guarantees.
async fn api_trade(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, HubError> {
    let (market, price, volume) = validate_trade_body(&body)?;

    let timestamp = chrono::Utc::now();
    {
        let conn = state.pool.get()?;
        trades::insert_trade(&conn, market, price, volume, timestamp.timestamp_millis())?;
    }

    state.refresher.request(market)?;

    Ok(Json(json!({
        "success": true,
        "message": "Trade recorded successfully",
        "data": {
            "market": market.code(),
            "price": price,
            "volume": volume,
            "timestamp": timestamp.to_rfc3339(),
        }
    })))
}

/// Boundary validation: no mutation happens unless every check passes.
fn validate_trade_body(body: &Value) -> Result<(Market, f64, f64), HubError> {
    let market_field = body.get("market").filter(|v| !v.is_null());
    let price_field = body.get("price").filter(|v| !v.is_null());
    let volume_field = body.get("volume").filter(|v| !v.is_null());

    let (Some(market_v), Some(price_v), Some(volume_v)) = (market_field, price_field, volume_field)
    else {
        return Err(HubError::BadRequest(
            "Missing required fields: market, price, and volume are required".to_string(),
        ));
    };

    let market = market_v
        .as_str()
        .and_then(Market::parse)
        .ok_or_else(|| HubError::BadRequest("Invalid market".to_string()))?;

    let (Some(price), Some(volume)) = (price_v.as_f64(), volume_v.as_f64()) else {
        return Err(HubError::BadRequest(
            "Price and volume must be numeric values".to_string(),
        ));
    };

    if price <= 0.0 || volume <= 0.0 {
        return Err(HubError::BadRequest(
            "Price and volume must be positive values".to_string(),
        ));
    }

    Ok((market, price, volume))
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    market: Option<String>,
    #[serde(default = "default_trades_limit")]
    limit: u32,
}

fn default_trades_limit() -> u32 {
    50
}

/// GET /api/trades — a market's most recent trades, newest first.
async fn api_recent_trades(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TradesQuery>,
) -> Result<Json<Value>, HubError> {
    let market = match q.market.as_deref() {
        None => Market::IndWins,
        Some(s) => {
            Market::parse(s).ok_or_else(|| HubError::BadRequest("Invalid market".to_string()))?
        }
    };
    let limit = q.limit.clamp(1, 200);

    let conn = state.pool.get()?;
    let data = trades::recent_trades(&conn, market, limit)?;
    Ok(Json(json!({
        "data": data,
        "limit": limit,
    })))
}
