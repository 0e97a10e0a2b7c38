use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::market::{kline_table, Market, Resolution};

/// One OHLCV candle from a materialized kline table.
///
/// `bucket` is the start of the interval in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub bucket: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub currency_code: String,
}

/// Fetch candles for a market/resolution, most recent bucket first.
pub fn fetch_klines(
    conn: &Connection,
    market: Market,
    resolution: Resolution,
    limit: u32,
) -> Result<Vec<Candle>, HubError> {
    let table = kline_table(market, resolution);
    let mut stmt = conn.prepare(&format!(
        "SELECT bucket, open, high, low, close, volume, currency_code
         FROM {table}
         WHERE currency_code = ?1
         ORDER BY bucket DESC
         LIMIT ?2"
    ))?;

    let rows = stmt
        .query_map(params![market.code(), limit], |row| {
            Ok(Candle {
                bucket: row.get(0)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
                currency_code: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
