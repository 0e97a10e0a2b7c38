use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::HubError;
use crate::market::Market;

/// One executed trade from a market's append-only log.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRow {
    pub time: i64,
    pub price: f64,
    pub volume: f64,
    pub currency_code: String,
}

/// Append one immutable trade row.  `time_ms` is assigned by the caller at
/// insert time, never taken from the submission.
pub fn insert_trade(
    conn: &Connection,
    market: Market,
    price: f64,
    volume: f64,
    time_ms: i64,
) -> Result<(), HubError> {
    let table = market.price_table();
    conn.execute(
        &format!(
            "INSERT INTO {table} (time, price, volume, currency_code)
             VALUES (?1, ?2, ?3, ?4)"
        ),
        params![time_ms, price, volume, market.code()],
    )?;
    Ok(())
}

/// Full trade history for a market in chronological order.  Insertion id
/// breaks ties between trades recorded in the same millisecond.
pub fn trade_history(conn: &Connection, market: Market) -> Result<Vec<TradeRow>, HubError> {
    let table = market.price_table();
    let mut stmt = conn.prepare(&format!(
        "SELECT time, price, volume, currency_code
         FROM {table}
         ORDER BY time ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TradeRow {
                time: row.get(0)?,
                price: row.get(1)?,
                volume: row.get(2)?,
                currency_code: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most recent trades for a market, newest first.
pub fn recent_trades(
    conn: &Connection,
    market: Market,
    limit: u32,
) -> Result<Vec<TradeRow>, HubError> {
    let table = market.price_table();
    let mut stmt = conn.prepare(&format!(
        "SELECT time, price, volume, currency_code
         FROM {table}
         ORDER BY id DESC
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(TradeRow {
                time: row.get(0)?,
                price: row.get(1)?,
                volume: row.get(2)?,
                currency_code: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of stored trades for a market.
pub fn trade_count(conn: &Connection, market: Market) -> Result<i64, HubError> {
    let table = market.price_table();
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(n)
}
