use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::error::HubError;
use crate::market::{kline_table, Market, Resolution};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Create a read-write SQLite connection pool for the given database file.
///
/// Unlike a read-only observer, the hub owns this store, so a missing file
/// is created and pool construction failure is a startup error.
pub fn open_rw_pool(path: &Path, max_size: u32) -> Result<DbPool, HubError> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
    });
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| HubError::Db(format!("failed to open trade store {}: {e}", path.display())))
}

/// Create the trade log tables and candle tables if absent.
///
/// The candle tables are disposable caches: dropping them loses nothing,
/// the aggregator rebuilds them from the trade log.
pub fn init_schema(conn: &Connection) -> Result<(), HubError> {
    for market in Market::ALL {
        let table = market.price_table();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 time INTEGER NOT NULL,
                 price REAL NOT NULL,
                 volume REAL NOT NULL,
                 currency_code TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_time ON {table}(time);"
        ))?;

        for resolution in Resolution::ALL {
            let view = kline_table(market, resolution);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {view} (
                     bucket INTEGER NOT NULL,
                     open REAL NOT NULL,
                     high REAL NOT NULL,
                     low REAL NOT NULL,
                     close REAL NOT NULL,
                     volume REAL NOT NULL,
                     currency_code TEXT NOT NULL,
                     PRIMARY KEY (bucket, currency_code)
                 );"
            ))?;
        }
    }
    Ok(())
}
