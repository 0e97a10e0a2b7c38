//! Chart-side consumer of the kline API.
//!
//! The rendering layer is an external collaborator; this module owns the
//! data path it feeds on: fetching candles for the current selection,
//! reshaping them into a time-ascending series, and cancelling a stale
//! in-flight fetch when the selection changes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::klines::Candle;
use crate::market::{Market, Resolution};

/// A chart selection: one market at one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub resolution: Resolution,
    pub market: Market,
}

/// One point of the rendered series: close price plus bucket volume.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub time: i64,
    pub value: f64,
    pub volume: f64,
}

/// Reshape API rows (newest bucket first) into a render-ready series:
/// dedupe by bucket keeping the freshest row, then sort time-ascending.
pub fn shape_series(rows: &[Candle]) -> Vec<ChartPoint> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut points: Vec<ChartPoint> = rows
        .iter()
        .filter(|c| seen.insert(c.bucket))
        .map(|c| ChartPoint {
            time: c.bucket,
            value: c.close,
            volume: c.volume,
        })
        .collect();
    points.sort_by_key(|p| p.time);
    points
}

/// Typed HTTP client for `GET /api/klines`.
pub struct KlinesClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KlinesClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    pub async fn fetch_klines(
        &self,
        resolution: Resolution,
        market: Market,
    ) -> Result<Vec<Candle>, String> {
        let url = format!("{}/api/klines", self.base_url);
        let mut req = self
            .http
            .get(&url)
            .query(&[("resolution", resolution.code()), ("market", market.code())]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| format!("klines request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("klines request failed: HTTP {}", resp.status()));
        }
        resp.json::<Vec<Candle>>()
            .await
            .map_err(|e| format!("klines response parse failed: {e}"))
    }
}

/// Snapshot of the chart data for the current selection.
///
/// A failed fetch is terminal for its selection: `loading` clears, `error`
/// records the cause, and nothing retries until the next `select`.
#[derive(Debug, Clone)]
pub struct ChartSnapshot {
    pub selection: Option<Selection>,
    pub points: Vec<ChartPoint>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ChartSnapshot {
    fn empty() -> Self {
        Self {
            selection: None,
            points: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Chart data feed with cancellation-on-supersede.
///
/// `select` aborts whatever fetch is still in flight before spawning the
/// next one, so a slow response for an old selection can never overwrite
/// a fresher one.
pub struct ChartFeed {
    client: Arc<KlinesClient>,
    snapshot: Arc<watch::Sender<ChartSnapshot>>,
    inflight: Mutex<Option<JoinHandle<()>>>,
}

impl ChartFeed {
    pub fn new(client: KlinesClient) -> Self {
        let (tx, _rx) = watch::channel(ChartSnapshot::empty());
        Self {
            client: Arc::new(client),
            snapshot: Arc::new(tx),
            inflight: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChartSnapshot> {
        self.snapshot.subscribe()
    }

    /// Switch the feed to a new selection and fetch it.
    pub fn select(&self, resolution: Resolution, market: Market) {
        let selection = Selection { resolution, market };

        // Supersede: the previous fetch must not land after this one starts.
        if let Some(prev) = self.inflight.lock().unwrap().take() {
            prev.abort();
        }

        self.snapshot.send_replace(ChartSnapshot {
            selection: Some(selection),
            points: Vec::new(),
            loading: true,
            error: None,
        });

        let client = Arc::clone(&self.client);
        let snapshot = Arc::clone(&self.snapshot);
        let handle = tokio::spawn(async move {
            let update = match client.fetch_klines(resolution, market).await {
                Ok(rows) => ChartSnapshot {
                    selection: Some(selection),
                    points: shape_series(&rows),
                    loading: false,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("chart fetch failed: {e}");
                    ChartSnapshot {
                        selection: Some(selection),
                        points: Vec::new(),
                        loading: false,
                        error: Some(e),
                    }
                }
            };
            snapshot.send_replace(update);
        });

        *self.inflight.lock().unwrap() = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(bucket: i64, close: f64, volume: f64) -> Candle {
        Candle {
            bucket,
            open: close,
            high: close,
            low: close,
            close,
            volume,
            currency_code: "ind_wins".to_string(),
        }
    }

    #[test]
    fn shape_sorts_ascending() {
        // API order: newest first.
        let rows = vec![candle(180_000, 3.0, 1.0), candle(120_000, 2.0, 1.0), candle(60_000, 1.0, 1.0)];
        let points = shape_series(&rows);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].time, 60_000);
        assert_eq!(points[2].time, 180_000);
        assert_eq!(points[2].value, 3.0);
    }

    #[test]
    fn shape_dedupes_by_bucket_keeping_freshest() {
        let rows = vec![
            candle(120_000, 9.0, 5.0),
            candle(120_000, 2.0, 1.0),
            candle(60_000, 1.0, 1.0),
        ];
        let points = shape_series(&rows);
        assert_eq!(points.len(), 2);
        let last = &points[1];
        assert_eq!(last.time, 120_000);
        // First occurrence in API order is the freshest row.
        assert_eq!(last.value, 9.0);
        assert_eq!(last.volume, 5.0);
    }

    #[test]
    fn shape_of_empty_is_empty() {
        assert!(shape_series(&[]).is_empty());
    }

    mod live {
        use super::*;
        use crate::aggregate;
        use crate::config::HubConfig;
        use crate::db::trades::insert_trade;
        use crate::state::AppState;
        use std::path::PathBuf;
        use std::sync::Arc;
        use std::time::Duration;
        use std::time::{SystemTime, UNIX_EPOCH};

        fn tmp_db_path(tag: &str) -> PathBuf {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            std::env::temp_dir().join(format!("cricbet_{tag}_{nanos}.db"))
        }

        async fn serve_state(tag: &str) -> (Arc<AppState>, String) {
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
            let state = AppState::new(config).unwrap();
            let app = crate::routes::api_router().with_state(state.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (state, format!("http://{addr}"))
        }

        async fn settled(rx: &mut watch::Receiver<ChartSnapshot>) -> ChartSnapshot {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    rx.changed().await.unwrap();
                    let snap = rx.borrow().clone();
                    if !snap.loading {
                        return snap;
                    }
                }
            })
            .await
            .expect("chart fetch did not settle")
        }

        #[tokio::test]
        async fn feed_fetches_and_shapes_current_selection() {
            let (state, base_url) = serve_state("chart_feed").await;
            {
                let mut conn = state.pool.get().unwrap();
                insert_trade(&conn, Market::IndWins, 2.0, 1.0, 61_000).unwrap();
                insert_trade(&conn, Market::IndWins, 3.0, 2.0, 121_000).unwrap();
                aggregate::refresh_market(&mut conn, Market::IndWins).unwrap();
            }

            let feed = ChartFeed::new(KlinesClient::new(base_url, None));
            let mut rx = feed.subscribe();
            feed.select(Resolution::M1, Market::IndWins);

            let snap = settled(&mut rx).await;
            assert!(snap.error.is_none());
            assert_eq!(
                snap.selection,
                Some(Selection {
                    resolution: Resolution::M1,
                    market: Market::IndWins,
                })
            );
            assert_eq!(snap.points.len(), 2);
            assert!(snap.points.windows(2).all(|w| w[0].time < w[1].time));
            assert_eq!(snap.points[1].value, 3.0);
        }

        #[tokio::test]
        async fn fetch_failure_is_terminal_not_retried() {
            // No server behind this port: connection refused.
            let feed = ChartFeed::new(KlinesClient::new("http://127.0.0.1:1", None));
            let mut rx = feed.subscribe();
            feed.select(Resolution::H1, Market::VkCentury);

            let snap = settled(&mut rx).await;
            assert!(!snap.loading);
            assert!(snap.error.is_some());
            assert!(snap.points.is_empty());
        }
    }
}
