//! PostgreSQL store backend: pool, migrations and a schema check.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;
use wavepeak_core::Config;

/// Tables the repositories read and write.
pub const REQUIRED_TABLES: [&str; 2] = ["profiles", "reference_items"];

/// Connect, migrate, and make sure both store tables are present.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = connect(config).await?;
    run_migrations(&pool).await?;
    verify_schema(&pool).await?;
    Ok(pool)
}

async fn connect(config: &Config) -> Result<PgPool> {
    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set when using the postgres store backend")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .connect(database_url)
        .await
        .context("Failed to connect to the profile and reference item database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        acquire_timeout_secs = config.db_timeout_seconds(),
        "Store database connected"
    );
    Ok(pool)
}

async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}

/// Fails when a required table is missing, e.g. when migrations were run
/// against another schema.
async fn verify_schema(pool: &PgPool) -> Result<()> {
    let present: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = current_schema() AND table_name = ANY($1)
        "#,
    )
    .bind(&REQUIRED_TABLES[..])
    .fetch_all(pool)
    .await
    .context("Failed to inspect store tables")?;

    let missing = missing_tables(&present);
    if !missing.is_empty() {
        anyhow::bail!("Store tables missing after migrations: {}", missing.join(", "));
    }

    tracing::info!(tables = ?present, "Store tables ready");
    Ok(())
}

fn missing_tables(present: &[String]) -> Vec<&'static str> {
    REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|p| p == table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tables() {
        assert_eq!(missing_tables(&[]), vec!["profiles", "reference_items"]);
        assert_eq!(
            missing_tables(&["reference_items".to_string()]),
            vec!["profiles"]
        );
        assert!(missing_tables(&["profiles".to_string(), "reference_items".to_string()]).is_empty());
    }
}
