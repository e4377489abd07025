//! Database migration command.
//!
//! Migrations run against the *base* URI, not the optimized one: the
//! pooler endpoint multiplexes sessions, and the migrator's advisory lock
//! needs a session of its own on the direct endpoint.

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

use marula_db::{ConfigError, DatabaseConfig, MIGRATOR};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns [`MigrateError`] if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrateError> {
    let config = DatabaseConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(config.connect_timeout)
        .connect(config.uri.expose_secret())
        .await?;

    tracing::info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
