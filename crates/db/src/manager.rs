//! Connection lifecycle management.
//!
//! The manager owns the executor for the life of the process: it builds
//! one lazily on first use, hands out shared references, and rebuilds it
//! after a reported transient failure. It is a value, not a global -
//! construct one at startup and clone the handle wherever it is needed.
//!
//! # State machine
//!
//! `Uninitialized -> Ready` on the first executor request.
//! `Ready -> Reconnecting` when a caller reports a transient failure.
//! `Reconnecting -> Ready` after a fixed 5-second delay and a fresh
//! executor build. The rebuilt executor is not reachability-checked;
//! pools connect lazily, so ready means configured, and [`ping`] exists
//! for callers that want proof.
//!
//! [`ping`]: ConnectionManager::ping

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use url::Url;

use crate::config::{DatabaseConfig, Transport};
use crate::error::DbError;
use crate::executor::{HttpExecutor, QueryExecutor, TcpExecutor};
use crate::uri::{UriError, http_endpoint, optimize_uri};

/// How long to wait before building a replacement executor.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Where the manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No executor has been built yet.
    Uninitialized,
    /// An executor is available.
    Ready,
    /// A transient failure was reported; a rebuild is pending.
    Reconnecting,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

struct Inner {
    state: ManagerState,
    executor: Option<Arc<dyn QueryExecutor>>,
}

struct Shared {
    config: DatabaseConfig,
    /// The optimized URI both transports connect with.
    uri: SecretString,
    /// Precomputed for the http transport, `None` for tcp.
    endpoint: Option<Url>,
    inner: RwLock<Inner>,
    /// Guard against overlapping reconnect cycles.
    reconnecting: AtomicBool,
}

/// A cloneable handle to the shared connection state.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager from configuration.
    ///
    /// The connection URI is optimized (pooler host, provider parameters)
    /// exactly once, here. No connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if the configured URI is malformed.
    pub fn new(config: DatabaseConfig) -> Result<Self, UriError> {
        let uri = SecretString::from(optimize_uri(config.uri.expose_secret())?);
        let endpoint = match config.transport {
            Transport::Http => Some(http_endpoint(uri.expose_secret())?),
            Transport::Tcp => None,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                uri,
                endpoint,
                inner: RwLock::new(Inner {
                    state: ManagerState::Uninitialized,
                    executor: None,
                }),
                reconnecting: AtomicBool::new(false),
            }),
        })
    }

    /// The transport this manager was configured with.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.shared.config.transport
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ManagerState {
        self.shared.inner.read().await.state
    }

    /// Get the current executor, building one on first use.
    ///
    /// During a reconnect cycle the previous executor keeps being handed
    /// out; callers see its failures until the replacement lands.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if an executor cannot be constructed.
    pub async fn executor(&self) -> Result<Arc<dyn QueryExecutor>, DbError> {
        {
            let inner = self.shared.inner.read().await;
            if let Some(executor) = &inner.executor {
                return Ok(Arc::clone(executor));
            }
        }

        let mut inner = self.shared.inner.write().await;
        if let Some(executor) = &inner.executor {
            return Ok(Arc::clone(executor));
        }

        let executor = self.shared.build_executor()?;
        inner.executor = Some(Arc::clone(&executor));
        inner.state = ManagerState::Ready;
        tracing::info!(transport = %self.shared.config.transport, "database executor initialized");
        Ok(executor)
    }

    /// Report an operation failure.
    ///
    /// Non-transient errors are ignored. A transient error starts a
    /// reconnect cycle unless one is already in flight; returns whether a
    /// cycle was started.
    pub fn report_failure(&self, error: &DbError) -> bool {
        if !error.is_transient() {
            return false;
        }

        if self
            .shared
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        tracing::warn!(
            %error,
            delay_secs = RECONNECT_DELAY.as_secs(),
            "transient database failure, scheduling reconnect"
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            {
                let mut inner = shared.inner.write().await;
                inner.state = ManagerState::Reconnecting;
            }

            tokio::time::sleep(RECONNECT_DELAY).await;

            let mut inner = shared.inner.write().await;
            match shared.build_executor() {
                Ok(executor) => {
                    inner.executor = Some(executor);
                    inner.state = ManagerState::Ready;
                    tracing::info!("database executor rebuilt");
                }
                Err(error) => {
                    // drop the broken executor; the next request retries the build
                    inner.executor = None;
                    inner.state = ManagerState::Uninitialized;
                    tracing::error!(%error, "failed to rebuild database executor");
                }
            }
            shared.reconnecting.store(false, Ordering::Release);
        });

        true
    }

    /// Round-trip a trivial statement to verify reachability.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the executor cannot be built or the
    /// statement fails.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.executor().await?.ping().await
    }
}

impl Shared {
    fn build_executor(&self) -> Result<Arc<dyn QueryExecutor>, DbError> {
        match self.config.transport {
            Transport::Tcp => Ok(Arc::new(TcpExecutor::connect_lazy(&self.uri, &self.config)?)),
            Transport::Http => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    DbError::Transport("http transport selected without an endpoint".to_owned())
                })?;
                Ok(Arc::new(HttpExecutor::new(
                    &self.uri,
                    endpoint,
                    &self.config,
                )?))
            }
        }
    }
}
