use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::klines::{fetch_klines, Candle};
use crate::error::HubError;
use crate::market::{Market, Resolution};
use crate::state::AppState;

/// Hard cap on returned candles; there is no pagination beyond it.
pub const KLINES_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct KlinesQuery {
    resolution: Option<String>,
    market: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/klines", get(api_klines))
}

/// GET /api/klines — candles for a market/resolution, newest bucket first.
///
/// Both parameters are validated against their enums before any store
/// access; the pair selects which kline table is queried, so the
/// whitelist is load-bearing, not cosmetic.
async fn api_klines(
    State(state): State<Arc<AppState>>,
    Query(q): Query<KlinesQuery>,
) -> Result<Json<Vec<Candle>>, HubError> {
    let resolution = match q.resolution.as_deref() {
        None => Resolution::H1,
        Some(s) => Resolution::parse(s)
            .ok_or_else(|| HubError::BadRequest("Invalid resolution".to_string()))?,
    };
    let market = match q.market.as_deref() {
        None => Market::IndWins,
        Some(s) => {
            Market::parse(s).ok_or_else(|| HubError::BadRequest("Invalid market".to_string()))?
        }
    };

    let conn = state.pool.get()?;
    let rows = fetch_klines(&conn, market, resolution, KLINES_LIMIT)?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::config::HubConfig;
    use crate::db::trades::insert_trade;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tower::ServiceExt;

    fn tmp_db_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("cricbet_{tag}_{nanos}.db"))
    }

    fn test_state(tag: &str) -> Arc<AppState> {
        let config = HubConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            token: String::new(),
            db_path: tmp_db_path(tag),
            db_pool_size: 2,
            refresh_mode: "immediate".to_string(),
            refresh_delay_ms: 500,
            refresh_interval_ms: 5000,
        };
        AppState::new(config).unwrap()
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let app = routes().with_state(state);
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn rejects_out_of_enum_resolution() {
        let state = test_state("klines_badres");
        let (status, body) = get_json(state, "/api/klines?resolution=1d").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid resolution");
    }

    #[tokio::test]
    async fn rejects_out_of_enum_market() {
        let state = test_state("klines_badmkt");
        let (status, body) = get_json(state, "/api/klines?market=btc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid market");
    }

    #[tokio::test]
    async fn defaults_to_1h_ind_wins_descending() {
        let state = test_state("klines_default");
        {
            let mut conn = state.pool.get().unwrap();
            insert_trade(&conn, Market::IndWins, 2.0, 1.0, 1_000).unwrap();
            insert_trade(&conn, Market::IndWins, 3.0, 1.0, 3_700_000).unwrap();
            aggregate::refresh_market(&mut conn, Market::IndWins).unwrap();
        }

        let (status, body) = get_json(state, "/api/klines").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.len() <= KLINES_LIMIT as usize);
        assert!(rows[0]["bucket"].as_i64() > rows[1]["bucket"].as_i64());
        // Hour-wide buckets prove the default resolution was applied.
        assert_eq!(rows[0]["bucket"].as_i64(), Some(3_600_000));
        assert_eq!(rows[1]["bucket"].as_i64(), Some(0));
        assert!(rows.iter().all(|r| r["currency_code"] == "ind_wins"));
    }

    #[tokio::test]
    async fn empty_market_returns_empty_array() {
        let state = test_state("klines_empty");
        let (status, body) = get_json(state, "/api/klines?resolution=1w&market=vk_century").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }
}
