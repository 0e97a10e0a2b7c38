//! Recomputation trigger policy.
//!
//! Ingestion never calls the aggregator directly; it asks the `Refresher`,
//! which applies the configured policy.  `Immediate` runs the full
//! recompute inline before the response; the other two move the
//! unbounded-cost recompute off the request path.

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::aggregate;
use crate::db::pool::DbPool;
use crate::error::HubError;
use crate::market::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Recompute all three resolutions synchronously on every request.
    Immediate,
    /// Recompute once a market has been quiet for `delay`.
    Debounced { delay: Duration },
    /// Recompute all dirty markets every `interval`.
    Scheduled { interval: Duration },
}

/// Shared handle that turns "trade accepted" into "views refreshed"
/// according to the policy.
pub struct Refresher {
    pool: DbPool,
    queue: Option<mpsc::UnboundedSender<Market>>,
}

impl Refresher {
    pub fn new(policy: RefreshPolicy, pool: DbPool) -> Self {
        let queue = match policy {
            RefreshPolicy::Immediate => None,
            RefreshPolicy::Debounced { delay } => Some(spawn_debounced(pool.clone(), delay)),
            RefreshPolicy::Scheduled { interval } => Some(spawn_scheduled(pool.clone(), interval)),
        };
        Self { pool, queue }
    }

    /// Request recomputation of a market's candle views.
    ///
    /// Under `Immediate` this runs the recompute and reports its error;
    /// the caller's trade append has already committed by this point and
    /// is not rolled back.  Under the deferred policies this only enqueues
    /// and recompute errors are logged by the worker.
    pub fn request(&self, market: Market) -> Result<(), HubError> {
        match &self.queue {
            None => {
                let mut conn = self.pool.get()?;
                aggregate::refresh_market(&mut conn, market)
            }
            Some(tx) => {
                if tx.send(market).is_err() {
                    // Worker gone (shutdown path): fall back to inline.
                    let mut conn = self.pool.get()?;
                    aggregate::refresh_market(&mut conn, market)?;
                }
                Ok(())
            }
        }
    }
}

fn refresh_logged(pool: &DbPool, market: Market) {
    let result = pool
        .get()
        .map_err(HubError::from)
        .and_then(|mut conn| aggregate::refresh_market(&mut conn, market));
    if let Err(e) = result {
        tracing::error!("deferred kline refresh failed for {}: {e}", market.code());
    }
}

fn spawn_debounced(pool: DbPool, delay: Duration) -> mpsc::UnboundedSender<Market> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut pending: HashSet<Market> = HashSet::new();
        let mut open = true;
        while open || !pending.is_empty() {
            if pending.is_empty() {
                match rx.recv().await {
                    Some(market) => {
                        pending.insert(market);
                    }
                    None => {
                        open = false;
                        continue;
                    }
                }
            }
            // Absorb further requests until the markets have been quiet
            // for `delay`, then flush.
            loop {
                match tokio::time::timeout(delay, rx.recv()).await {
                    Ok(Some(market)) => {
                        pending.insert(market);
                    }
                    Ok(None) => {
                        open = false;
                        break;
                    }
                    Err(_) => break,
                }
            }
            for market in pending.drain() {
                refresh_logged(&pool, market);
            }
        }
    });
    tx
}

fn spawn_scheduled(pool: DbPool, interval: Duration) -> mpsc::UnboundedSender<Market> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut dirty: HashSet<Market> = HashSet::new();
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(market) => {
                        dirty.insert(market);
                    }
                    None => break,
                },
                _ = tick.tick() => {
                    for market in dirty.drain() {
                        refresh_logged(&pool, market);
                    }
                }
            }
        }
        // Flush whatever was dirty at shutdown.
        for market in dirty.drain() {
            refresh_logged(&pool, market);
        }
    });
    tx
}
