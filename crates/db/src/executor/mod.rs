//! The query-executor seam.
//!
//! Application code above this layer is written against [`QueryExecutor`]
//! and never knows which transport is active. Two implementations exist:
//!
//! - [`TcpExecutor`] - Postgres wire protocol through a sqlx pool
//! - [`HttpExecutor`] - SQL tunneled over HTTPS for socketless runtimes
//!
//! Both consume the same [`Statement`]: SQL text with `$n` placeholders and
//! a closed set of [`Param`] values, and both produce rows as JSON maps so
//! the store can decode them identically.

mod http;
mod tcp;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Transport;
use crate::error::DbError;

pub use http::HttpExecutor;
pub use tcp::TcpExecutor;

/// A decoded result row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// A bindable statement parameter.
///
/// Closed on purpose: every value the store binds has a known Postgres
/// type, and both transports must agree on its encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Uuid(Uuid),
    Text(String),
    Json(Value),
    Int(i64),
    Bool(bool),
}

impl Param {
    /// Encoding used by the HTTP transport, which sends parameters as JSON
    /// and lets the server cast from text representations.
    #[must_use]
    pub fn to_wire_json(&self) -> Value {
        match self {
            Self::Uuid(v) => Value::String(v.to_string()),
            Self::Text(v) => Value::String(v.clone()),
            Self::Json(v) => Value::String(v.to_string()),
            Self::Int(v) => Value::Number((*v).into()),
            Self::Bool(v) => Value::Bool(*v),
        }
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    /// Create a statement.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Executes statements against the database over some transport.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement and return its rows.
    async fn fetch(&self, stmt: &Statement) -> Result<Vec<Row>, DbError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, stmt: &Statement) -> Result<u64, DbError>;

    /// Verify the database is reachable.
    async fn ping(&self) -> Result<(), DbError>;

    /// Which transport this executor uses.
    fn transport(&self) -> Transport;
}
