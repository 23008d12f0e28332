//! Application state shared by every handler.

use crate::pipeline::WaveformPipeline;
use sqlx::PgPool;
use wavepeak_core::Config;
use wavepeak_db::Stores;

/// Built once at startup; handlers receive it as `Arc<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub pipeline: WaveformPipeline,
    /// Present only for the postgres store backend.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        pipeline: WaveformPipeline,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            config,
            stores,
            pipeline,
            pool,
        }
    }
}
