//! HTTP transport: SQL tunneled over HTTPS.
//!
//! Serverless edge runtimes forbid raw TCP sockets, so the provider
//! exposes an HTTPS proxy on the database host that accepts
//! `{"query", "params"}` bodies and returns rows as JSON. The connection
//! string rides along in a request header; the proxy owns authentication
//! and pooling.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::config::{DatabaseConfig, Transport};
use crate::error::{DbError, classify_message};

use super::{Param, QueryExecutor, Row, Statement};

/// Header carrying the connection string to the proxy.
const CONNECTION_STRING_HEADER: &str = "Neon-Connection-String";

/// An executor speaking the provider's SQL-over-HTTP protocol.
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoint: Url,
    uri: SecretString,
}

/// Successful proxy response.
#[derive(Debug, Deserialize)]
struct SqlResponse {
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(rename = "rowCount", default)]
    row_count: Option<u64>,
}

/// Error body the proxy returns on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpExecutor {
    /// Build an HTTP executor for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Transport`] if the underlying client cannot be
    /// constructed (TLS backend initialization).
    pub fn new(uri: &SecretString, endpoint: Url, config: &DatabaseConfig) -> Result<Self, DbError> {
        let client = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            uri: uri.clone(),
        })
    }

    async fn send(&self, stmt: &Statement) -> Result<SqlResponse, DbError> {
        let body = serde_json::json!({
            "query": stmt.sql,
            "params": stmt.params.iter().map(Param::to_wire_json).collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONNECTION_STRING_HEADER, self.uri.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(classify_proxy_error(status, &raw));
        }

        Ok(response.json::<SqlResponse>().await?)
    }
}

#[async_trait]
impl QueryExecutor for HttpExecutor {
    async fn fetch(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        Ok(self.send(stmt).await?.rows)
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64, DbError> {
        let response = self.send(stmt).await?;
        let rows = response.rows.len() as u64;
        Ok(response.row_count.unwrap_or(rows))
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.send(&Statement::new("SELECT 1", vec![])).await?;
        Ok(())
    }

    fn transport(&self) -> Transport {
        Transport::Http
    }
}

/// Turn a proxy failure into a [`DbError`].
///
/// Gateway statuses are reliable signals on their own; everything else
/// only carries a message string, which goes through the substring
/// classifier.
fn classify_proxy_error(status: StatusCode, raw_body: &str) -> DbError {
    let message = serde_json::from_str::<ErrorBody>(raw_body)
        .map_or_else(|_| format!("http {status}: {raw_body}"), |body| body.message);

    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => DbError::Connection(message),
        StatusCode::GATEWAY_TIMEOUT => DbError::Timeout(message),
        _ => classify_message(&message),
    }
}
