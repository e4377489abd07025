//! Marula DB - Database resilience layer.
//!
//! This crate owns everything between the content platform's document
//! operations and the managed Postgres provider:
//!
//! - [`uri`] - Connection-string optimizer (pooler host, provider parameters)
//! - [`config`] - `DATABASE_*` environment configuration
//! - [`error`] - Closed error taxonomy with a transient/fatal split
//! - [`executor`] - The query-executor seam with TCP (sqlx pool) and
//!   SQL-over-HTTP (reqwest) transports
//! - [`manager`] - Connection lifecycle: lazy init, reconnect after failure
//! - [`retry`] - Fixed-delay retry policy for transient failures
//! - [`store`] - Retry-wrapped document and global CRUD
//!
//! # Architecture
//!
//! The transport is chosen once at startup from configuration; application
//! code talks to [`CollectionStore`] and never branches on the runtime it
//! is deployed to. Every store operation runs through the retry policy,
//! and a final transient failure tells the [`ConnectionManager`] to build
//! a fresh pool. Nothing here is a process-wide singleton: construct a
//! manager at startup and hand it to whatever needs it.
//!
//! ```rust,no_run
//! use marula_core::CollectionName;
//! use marula_db::{CollectionStore, ConnectionManager, DatabaseConfig, Filter, FindOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::from_env()?;
//! let manager = ConnectionManager::new(config)?;
//! let store = CollectionStore::new(manager);
//!
//! let products = CollectionName::parse("products")?;
//! let found = store
//!     .find(&products, &Filter::new(), &FindOptions::default())
//!     .await?;
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod retry;
pub mod store;
pub mod uri;

pub use config::{ConfigError, DatabaseConfig, Transport};
pub use error::DbError;
pub use executor::{HttpExecutor, Param, QueryExecutor, Row, Statement, TcpExecutor};
pub use manager::{ConnectionManager, ManagerState};
pub use retry::RetryPolicy;
pub use store::{CollectionStore, Document, Filter, FindOptions, Global, Sort, SortDirection};
pub use uri::{UriError, http_endpoint, optimize_uri};

/// Embedded migrations for the document and global tables.
///
/// Run via `marula-cli migrate`; never applied implicitly at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
