//! Database error taxonomy.
//!
//! Every driver failure is translated into one [`DbError`] variant at the
//! transport boundary, so retry and reconnect decisions branch on a closed
//! set of kinds instead of free-text messages. The transient kinds
//! (`Connection`, `Timeout`, `Terminated`, `PoolExhausted`) are the only
//! ones the retry policy and connection manager act on.
//!
//! Structured sources come first: sqlx error variants and Postgres SQLSTATE
//! codes map directly. The SQL-over-HTTP proxy surfaces some failures as
//! nothing but a message string, so [`classify_message`] remains as the
//! last-resort substring classifier.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not reach or establish a connection to the database.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The operation did not complete within its time budget.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// An established connection was closed by the server.
    #[error("connection terminated: {0}")]
    Terminated(String),

    /// No pooled connection was available.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The statement itself failed (syntax, constraint other than unique,
    /// permission, bad data).
    #[error("query failed: {0}")]
    Query(String),

    /// A row came back in a shape this layer cannot decode.
    #[error("row decode failed: {0}")]
    Decode(String),

    /// Client-side transport plumbing failed (TLS setup, request building,
    /// malformed proxy response).
    #[error("transport error: {0}")]
    Transport(String),

    /// The addressed document does not exist.
    #[error("document not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DbError {
    /// Whether a retry (and a pool rebuild) can plausibly help.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Terminated(_) | Self::PoolExhausted(_)
        )
    }
}

/// Classify an opaque error message by substring.
///
/// Last resort for errors that arrive without structure (the HTTP proxy,
/// driver messages wrapped in strings). Anything unrecognized is a
/// [`DbError::Query`], which is never retried.
#[must_use]
pub fn classify_message(message: &str) -> DbError {
    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        DbError::Timeout(message.to_owned())
    } else if lower.contains("terminat") {
        DbError::Terminated(message.to_owned())
    } else if lower.contains("connection")
        || lower.contains("connect")
        || lower.contains("broken pipe")
        || lower.contains("reset by peer")
    {
        DbError::Connection(message.to_owned())
    } else {
        DbError::Query(message.to_owned())
    }
}

/// Map a Postgres server error by SQLSTATE.
fn classify_database_error(err: &dyn sqlx::error::DatabaseError) -> DbError {
    if err.is_unique_violation() {
        return DbError::Conflict(err.message().to_owned());
    }

    match err.code().as_deref() {
        // Class 08: connection exceptions
        Some(code) if code.starts_with("08") => DbError::Connection(err.message().to_owned()),
        // admin_shutdown, crash_shutdown, cannot_connect_now
        Some("57P01" | "57P02" | "57P03") => DbError::Terminated(err.message().to_owned()),
        // query_canceled (statement_timeout)
        Some("57014") => DbError::Timeout(err.message().to_owned()),
        // too_many_connections
        Some("53300") => DbError::PoolExhausted(err.message().to_owned()),
        _ => classify_message(err.message()),
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => classify_database_error(db.as_ref()),
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::Protocol(msg) => Self::Connection(msg),
            sqlx::Error::PoolTimedOut => {
                Self::PoolExhausted("timed out waiting for a pooled connection".to_owned())
            }
            sqlx::Error::PoolClosed => Self::PoolExhausted("connection pool is closed".to_owned()),
            sqlx::Error::WorkerCrashed => Self::Terminated("database worker crashed".to_owned()),
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Decode(format!("column {index}: {source}"))
            }
            sqlx::Error::ColumnNotFound(name) => Self::Decode(format!("column not found: {name}")),
            sqlx::Error::Decode(e) => Self::Decode(e.to_string()),
            sqlx::Error::Configuration(e) => Self::Transport(format!("configuration: {e}")),
            other => classify_message(&other.to_string()),
        }
    }
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(DbError::Connection("refused".into()).is_transient());
        assert!(DbError::Timeout("slow".into()).is_transient());
        assert!(DbError::Terminated("gone".into()).is_transient());
        assert!(DbError::PoolExhausted("full".into()).is_transient());
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(!DbError::Query("syntax error".into()).is_transient());
        assert!(!DbError::Decode("bad row".into()).is_transient());
        assert!(!DbError::Transport("tls".into()).is_transient());
        assert!(!DbError::NotFound.is_transient());
        assert!(!DbError::Conflict("dup".into()).is_transient());
    }

    #[test]
    fn test_classify_message_timeout() {
        assert!(matches!(
            classify_message("connection timeout while handshaking"),
            DbError::Timeout(_)
        ));
        assert!(matches!(
            classify_message("statement timed out"),
            DbError::Timeout(_)
        ));
    }

    #[test]
    fn test_classify_message_terminated() {
        assert!(matches!(
            classify_message("terminating connection due to administrator command"),
            DbError::Terminated(_)
        ));
    }

    #[test]
    fn test_classify_message_connection() {
        assert!(matches!(
            classify_message("could not connect to server"),
            DbError::Connection(_)
        ));
        assert!(matches!(
            classify_message("write failed: broken pipe"),
            DbError::Connection(_)
        ));
    }

    #[test]
    fn test_classify_message_unrecognized_is_query() {
        let err = classify_message("syntax error at or near \"SELCT\"");
        assert!(matches!(err, DbError::Query(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_sqlx_pool_errors() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::PoolExhausted(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::WorkerCrashed),
            DbError::Terminated(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound
        ));
    }

    #[test]
    fn test_sqlx_io_error_is_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            DbError::from(sqlx::Error::Io(io)),
            DbError::Connection(_)
        ));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            DbError::Connection("refused".into()).to_string(),
            "connection failed: refused"
        );
        assert_eq!(DbError::NotFound.to_string(), "document not found");
    }
}
