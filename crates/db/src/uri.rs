//! Connection-string optimizer.
//!
//! Managed Postgres providers publish two hostnames per database: the
//! direct endpoint and a pooler endpoint that multiplexes many client
//! connections onto fewer backend connections. Serverless deployments must
//! use the pooler, and the provider recommends a handful of libpq query
//! parameters that the base connection string usually omits.
//!
//! [`optimize_uri`] applies both rewrites. It is idempotent and never
//! overwrites a parameter the caller already set, so it is safe to call on
//! an already-optimized string.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

/// Query parameters appended when absent, in order.
pub const DEFAULT_PARAMS: &[(&str, &str)] = &[
    ("connect_timeout", "10"),
    ("keepalives", "1"),
    ("keepalives_idle", "30"),
    ("pool_timeout", "5"),
];

/// Suffix the provider appends to the endpoint label of pooler hostnames.
const POOLER_SUFFIX: &str = "-pooler";

/// Hostname label prefix identifying a provider endpoint
/// (e.g. `ep-foo.neon.tech`). Other hosts are left untouched.
const ENDPOINT_PREFIX: &str = "ep-";

/// Errors that can occur when optimizing a connection URI.
#[derive(Debug, Error)]
pub enum UriError {
    /// The input is not a parseable URL.
    #[error("invalid connection URI: {0}")]
    Parse(#[from] url::ParseError),

    /// The URI has no hostname.
    #[error("connection URI has no host")]
    MissingHost,

    /// The URI scheme is not a Postgres scheme.
    #[error("connection URI must use a postgres scheme, got {0:?}")]
    UnsupportedScheme(String),
}

/// Rewrite a base Postgres URI for the managed provider.
///
/// Two transformations, both applied at most once:
///
/// - provider endpoint hosts (`ep-foo.neon.tech`) are switched to their
///   pooler variant (`ep-foo-pooler.neon.tech`);
/// - the parameters in [`DEFAULT_PARAMS`] are appended, skipping any the
///   caller already supplied.
///
/// Calling this on its own output returns the same string.
///
/// # Errors
///
/// Returns [`UriError`] if the input does not parse, has no host, or does
/// not use a `postgres`/`postgresql` scheme.
pub fn optimize_uri(raw: &str) -> Result<String, UriError> {
    let mut url = Url::parse(raw)?;

    match url.scheme() {
        "postgres" | "postgresql" => {}
        other => return Err(UriError::UnsupportedScheme(other.to_owned())),
    }

    let host = url.host_str().ok_or(UriError::MissingHost)?.to_owned();
    let pooled = pooler_host(&host);
    if pooled != host {
        url.set_host(Some(&pooled))?;
    }

    let present: HashSet<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in DEFAULT_PARAMS {
            if !present.contains(*key) {
                pairs.append_pair(key, value);
            }
        }
    }

    Ok(url.into())
}

/// Derive the provider's SQL-over-HTTP endpoint for a connection URI.
///
/// Socketless runtimes reach the same logical database through an HTTPS
/// proxy on the database host: `https://<host>/sql`.
///
/// # Errors
///
/// Returns [`UriError`] if the URI does not parse or has no host.
pub fn http_endpoint(uri: &str) -> Result<Url, UriError> {
    let url = Url::parse(uri)?;
    let host = url.host_str().ok_or(UriError::MissingHost)?;
    Ok(Url::parse(&format!("https://{host}/sql"))?)
}

/// Switch an endpoint hostname to its pooler variant.
///
/// Only hosts whose first label looks like a provider endpoint (`ep-*`)
/// are rewritten; `localhost` and plain hosts pass through. Already-pooled
/// hosts are returned unchanged, which is what makes [`optimize_uri`]
/// idempotent.
fn pooler_host(host: &str) -> String {
    let Some((label, rest)) = host.split_once('.') else {
        return host.to_owned();
    };

    if !label.starts_with(ENDPOINT_PREFIX) || label.ends_with(POOLER_SUFFIX) {
        return host.to_owned();
    }

    format!("{label}{POOLER_SUFFIX}.{rest}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_endpoint_host() {
        let out = optimize_uri("postgres://u:p@ep-foo.neon.tech/db").unwrap();
        assert_eq!(
            out,
            "postgres://u:p@ep-foo-pooler.neon.tech/db?connect_timeout=10&keepalives=1&keepalives_idle=30&pool_timeout=5"
        );
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let once = optimize_uri("postgres://u:p@ep-foo.neon.tech/db?sslmode=require").unwrap();
        let twice = optimize_uri(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_optimize_keeps_caller_parameters() {
        let out = optimize_uri("postgres://u:p@ep-foo.neon.tech/db?connect_timeout=20").unwrap();
        assert!(out.contains("connect_timeout=20"));
        assert!(!out.contains("connect_timeout=10"));
        assert_eq!(out.matches("connect_timeout").count(), 1);
        assert!(out.contains("keepalives=1"));
        assert!(out.contains("keepalives_idle=30"));
        assert!(out.contains("pool_timeout=5"));
    }

    #[test]
    fn test_optimize_leaves_plain_hosts() {
        let out = optimize_uri("postgres://u:p@localhost:5432/db").unwrap();
        assert!(out.contains("localhost:5432"));
        assert!(!out.contains("-pooler"));
        // parameters are still appended
        assert!(out.contains("connect_timeout=10"));
    }

    #[test]
    fn test_optimize_does_not_double_pooler() {
        let out = optimize_uri("postgres://u:p@ep-foo-pooler.neon.tech/db").unwrap();
        assert!(out.contains("ep-foo-pooler.neon.tech"));
        assert!(!out.contains("pooler-pooler"));
    }

    #[test]
    fn test_optimize_accepts_postgresql_scheme() {
        assert!(optimize_uri("postgresql://u:p@ep-foo.neon.tech/db").is_ok());
    }

    #[test]
    fn test_optimize_rejects_other_schemes() {
        assert!(matches!(
            optimize_uri("mysql://u:p@host/db"),
            Err(UriError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_optimize_rejects_garbage() {
        assert!(matches!(
            optimize_uri("not a uri"),
            Err(UriError::Parse(_))
        ));
    }

    #[test]
    fn test_http_endpoint() {
        let endpoint = http_endpoint("postgres://u:p@ep-foo-pooler.neon.tech/db").unwrap();
        assert_eq!(endpoint.as_str(), "https://ep-foo-pooler.neon.tech/sql");
    }

    #[test]
    fn test_http_endpoint_requires_host() {
        assert!(matches!(
            http_endpoint("postgres:db"),
            Err(UriError::MissingHost)
        ));
    }

    #[test]
    fn test_pooler_host_bare_hostname() {
        assert_eq!(pooler_host("localhost"), "localhost");
    }
}
