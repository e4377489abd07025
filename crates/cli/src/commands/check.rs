//! Connectivity check command.

use marula_db::{ConfigError, ConnectionManager, DatabaseConfig, DbError, UriError};

/// Errors that can occur during a connectivity check.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection URI error: {0}")]
    Uri(#[from] UriError),

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

/// Build the configured transport and round-trip a statement.
///
/// # Errors
///
/// Returns [`CheckError`] if configuration is invalid or the database does
/// not answer.
pub async fn run() -> Result<(), CheckError> {
    let config = DatabaseConfig::from_env()?;
    let manager = ConnectionManager::new(config)?;

    tracing::info!(transport = %manager.transport(), "checking database connectivity");
    manager.ping().await?;
    tracing::info!(state = %manager.state().await, "database reachable");

    Ok(())
}
