/**
 * Database Setup
 *
 * Connects to PostgreSQL when a database URL is configured and applies the
 * migrations under `migrations/`. Without a URL the server runs on the
 * in-memory store, which is logged as a warning since nothing survives a
 * restart.
 *
 * A configured database that cannot be reached or migrated is a startup
 * error: the server never silently falls back to memory in that case.
 */

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::backend::error::BackendError;
use crate::shared::AppConfig;

const MAX_CONNECTIONS: u32 = 10;

/// Connect and migrate, or `None` when no database is configured
pub async fn load_database(config: &AppConfig) -> Result<Option<PgPool>, BackendError> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
        return Ok(None);
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database connection pool: {}", e);
            BackendError::internal("database unavailable")
        })?;
    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        BackendError::internal("database migration failed")
    })?;
    tracing::info!("Database migrations completed successfully");

    Ok(Some(pool))
}
