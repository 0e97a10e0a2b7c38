//! Candle recomputation.
//!
//! The kline tables are rebuilt from the full trade history, never updated
//! incrementally.  Recomputation is a pure function of total history, so
//! concurrent triggers race benignly: whichever recomputation commits last
//! wins, and any committed result is a valid snapshot.

use rusqlite::{params, Connection};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::db::klines::Candle;
use crate::db::trades::{self, TradeRow};
use crate::error::HubError;
use crate::market::{kline_table, Market, Resolution};

/// Fold a chronologically ordered trade history into candles.
///
/// Within a bucket: `open` is the earliest trade's price, `close` the
/// latest's, `high`/`low` the observed extrema, `volume` the sum.
pub fn compute_candles(trades: &[TradeRow], market: Market, resolution: Resolution) -> Vec<Candle> {
    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();

    for trade in trades {
        let bucket = resolution.bucket_of(trade.time);
        match buckets.entry(bucket) {
            Entry::Vacant(slot) => {
                slot.insert(Candle {
                    bucket,
                    open: trade.price,
                    high: trade.price,
                    low: trade.price,
                    close: trade.price,
                    volume: trade.volume,
                    currency_code: market.code().to_string(),
                });
            }
            Entry::Occupied(mut slot) => {
                let candle = slot.get_mut();
                candle.high = candle.high.max(trade.price);
                candle.low = candle.low.min(trade.price);
                candle.close = trade.price;
                candle.volume += trade.volume;
            }
        }
    }

    buckets.into_values().collect()
}

/// Rebuild one candle table from the market's trade log.
///
/// Delete and insert run in a single transaction: a failed recomputation
/// rolls back and leaves the previous candle set in place, stale but valid.
/// Returns the number of candles written.
pub fn refresh_view(
    conn: &mut Connection,
    market: Market,
    resolution: Resolution,
) -> Result<usize, HubError> {
    let history = trades::trade_history(conn, market)?;
    let candles = compute_candles(&history, market, resolution);
    let table = kline_table(market, resolution);

    let tx = conn.transaction()?;
    tx.execute(
        &format!("DELETE FROM {table} WHERE currency_code = ?1"),
        params![market.code()],
    )?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table} (bucket, open, high, low, close, volume, currency_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))?;
        for candle in &candles {
            stmt.execute(params![
                candle.bucket,
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
                candle.currency_code,
            ])?;
        }
    }
    tx.commit()?;

    tracing::debug!(
        market = market.code(),
        resolution = resolution.code(),
        candles = candles.len(),
        "kline view refreshed"
    );
    Ok(candles.len())
}

/// Rebuild all three resolutions for a market's namespace.
pub fn refresh_market(conn: &mut Connection, market: Market) -> Result<(), HubError> {
    for resolution in Resolution::ALL {
        refresh_view(conn, market, resolution)?;
    }
    Ok(())
}
