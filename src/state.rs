use std::sync::Arc;

use crate::config::HubConfig;
use crate::db::pool::{init_schema, open_rw_pool, DbPool};
use crate::error::HubError;
use crate::refresh::Refresher;

/// Shared application state, passed to all route handlers via
/// `axum::extract::State`.
///
/// The store pool is acquired here at startup and released when the last
/// handle drops after the server loop exits.
pub struct AppState {
    pub config: HubConfig,
    pub pool: DbPool,
    pub refresher: Refresher,
}

impl AppState {
    pub fn new(config: HubConfig) -> Result<Arc<Self>, HubError> {
        let pool = open_rw_pool(&config.db_path, config.db_pool_size)?;
        let conn = pool.get()?;
        init_schema(&conn)?;

        let refresher = Refresher::new(config.refresh_policy(), pool.clone());

        Ok(Arc::new(Self {
            config,
            pool,
            refresher,
        }))
    }
}
