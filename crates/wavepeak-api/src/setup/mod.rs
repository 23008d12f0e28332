//! Application setup and initialization
//!
//! Everything main.rs needs before it can serve: validated configuration,
//! telemetry, the persistence backend, the pipeline and the router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use wavepeak_core::{Config, StoreBackend};

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Report before validating so a missing variable is visible in the logs
    for (name, status) in config.environment_report() {
        tracing::info!(variable = name, status, "Environment check");
    }

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(
        store_backend = %config.store_backend(),
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = match config.store_backend() {
        StoreBackend::Postgres => Some(database::setup_database(&config).await?),
        StoreBackend::Supabase => None,
    };

    let stores = wavepeak_db::create_stores(&config, pool.clone())
        .context("Failed to initialize persistence stores")?;

    let state = services::initialize_services(&config, stores, pool)?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
