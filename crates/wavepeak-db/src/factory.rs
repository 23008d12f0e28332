use crate::postgres::{ProfileRepository, ReferenceItemRepository};
use crate::store::{ProfileStore, ReferenceItemStore, StoreError, StoreResult};
use crate::supabase::SupabaseStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use wavepeak_core::{Config, StoreBackend};

/// The store handles shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub profiles: Arc<dyn ProfileStore>,
    pub reference_items: Arc<dyn ReferenceItemStore>,
}

/// Create the persistence stores based on configuration.
///
/// `pool` must be provided for the postgres backend.
pub fn create_stores(config: &Config, pool: Option<PgPool>) -> StoreResult<Stores> {
    match config.store_backend() {
        StoreBackend::Supabase => {
            let url = config.supabase_url().ok_or_else(|| {
                StoreError::ConfigError(
                    "PUBLIC_SUPABASE_URL or SUPABASE_URL not configured".to_string(),
                )
            })?;
            let key = config.supabase_service_role_key().ok_or_else(|| {
                StoreError::ConfigError("SUPABASE_SERVICE_ROLE_KEY not configured".to_string())
            })?;

            tracing::info!("Initializing Supabase REST store");
            let store = Arc::new(SupabaseStore::new(
                url,
                key,
                Duration::from_secs(config.http_timeout_secs()),
            )?);
            Ok(Stores {
                profiles: store.clone(),
                reference_items: store,
            })
        }
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                StoreError::ConfigError(
                    "postgres store backend requires a database pool".to_string(),
                )
            })?;

            tracing::info!("Initializing PostgreSQL store");
            Ok(Stores {
                profiles: Arc::new(ProfileRepository::new(pool.clone())),
                reference_items: Arc::new(ReferenceItemRepository::new(pool)),
            })
        }
    }
}
