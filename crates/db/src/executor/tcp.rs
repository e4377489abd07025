//! TCP transport: Postgres wire protocol through a sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as _, Row as _, TypeInfo as _};
use uuid::Uuid;

use crate::config::{DatabaseConfig, Transport};
use crate::error::DbError;

use super::{Param, QueryExecutor, Row, Statement};

/// Idle connections kept warm even on a quiet process.
const POOL_MIN: u32 = 2;

/// A pooled TCP executor.
///
/// The pool connects lazily: constructing the executor never touches the
/// network, so a manager can flip to ready without a reachability check
/// and the first statement pays the connection cost.
pub struct TcpExecutor {
    pool: PgPool,
}

impl TcpExecutor {
    /// Build a lazily-connecting pool from an (already optimized) URI.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the URI does not parse as Postgres connect
    /// options. No I/O happens here.
    pub fn connect_lazy(uri: &SecretString, config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .min_connections(POOL_MIN)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_lazy(uri.expose_secret())?;

        Ok(Self { pool })
    }

    /// Access the underlying pool (migrations, health probes).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for TcpExecutor {
    async fn fetch(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        let mut query = sqlx::query(&stmt.sql);
        for param in &stmt.params {
            query = bind_param(query, param);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64, DbError> {
        let mut query = sqlx::query(&stmt.sql);
        for param in &stmt.params {
            query = bind_param(query, param);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn transport(&self) -> Transport {
        Transport::Tcp
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

fn bind_param<'q>(query: PgQuery<'q>, param: &Param) -> PgQuery<'q> {
    match param {
        Param::Uuid(v) => query.bind(*v),
        Param::Text(v) => query.bind(v.clone()),
        Param::Json(v) => query.bind(v.clone()),
        Param::Int(v) => query.bind(*v),
        Param::Bool(v) => query.bind(*v),
    }
}

/// Decode a wire-protocol row into the transport-neutral JSON shape.
///
/// The column set this layer queries is closed (uuid, text, jsonb,
/// timestamptz, integers, bool), so an unknown column type is a decode
/// error rather than a silent null.
fn row_to_json(row: &PgRow) -> Result<Row, DbError> {
    let mut out = Row::new();

    for column in row.columns() {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "UUID" => row
                .try_get::<Option<Uuid>, _>(index)?
                .map(|v| Value::String(v.to_string())),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(index)?.map(Value::String)
            }
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(|v| Value::String(v.to_rfc3339())),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
            other => {
                return Err(DbError::Decode(format!(
                    "unsupported column type {other} for column {}",
                    column.name()
                )));
            }
        };

        out.insert(column.name().to_owned(), value.unwrap_or(Value::Null));
    }

    Ok(out)
}
