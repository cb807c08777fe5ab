//! Backend capability surface.
//!
//! The driver is agnostic to backend families: it resolves a
//! [`BackendFactory`] once per run from a [`BackendRegistry`] keyed by a
//! validated [`BackendId`], and from then on only invokes
//! [`RequestHandler::execute`]. Connection construction, retry policy for
//! transient connection errors, and protocol encoding live behind these
//! traits.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use stampede_core::OperationDescriptor;
use tokio_util::sync::CancellationToken;

use crate::options::BenchmarkOptions;

/// Validated identifier of a backend family.
///
/// Unknown identifiers are rejected at configuration-resolution time, before
/// any connection is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    /// etcd v3 family.
    EtcdV3,
    /// ZooKeeper family.
    Zookeeper,
    /// Consul family.
    Consul,
    /// In-process memory backend (demos and tests).
    Memory,
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EtcdV3 => "etcd-v3",
            Self::Zookeeper => "zookeeper",
            Self::Consul => "consul",
            Self::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unknown backend identifier.
#[derive(Debug, thiserror::Error)]
#[error("unknown backend id: {0:?}")]
pub struct UnknownBackendId(String);

impl FromStr for BackendId {
    type Err = UnknownBackendId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "etcd-v3" => Ok(Self::EtcdV3),
            "zookeeper" => Ok(Self::Zookeeper),
            "consul" => Ok(Self::Consul),
            "memory" => Ok(Self::Memory),
            other => Err(UnknownBackendId(other.to_string())),
        }
    }
}

/// A per-request execution failure.
///
/// Handler errors never abort a run; their display text keys the error
/// histogram of the report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HandlerError {
    /// The key was not present on the backend.
    #[error("key not found")]
    KeyNotFound,

    /// The backend rejected or dropped the call.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The descriptor could not be executed as given.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Any other backend-reported failure.
    #[error("{0}")]
    Other(String),
}

/// Failure to establish backend connections; fatal to the run.
#[derive(Debug, thiserror::Error)]
#[error("failed to establish {backend} connections: {reason}")]
pub struct ConnectError {
    /// The backend family that failed.
    pub backend: BackendId,
    /// Backend-reported reason.
    pub reason: String,
}

/// Failure to notify load-generating peers; fatal to the run.
#[derive(Debug, thiserror::Error)]
#[error("heartbeat broadcast failed: {reason}")]
pub struct NotifyError {
    /// Transport- or peer-reported reason.
    pub reason: String,
}

/// A capability bound to one live backend connection.
///
/// `execute` performs exactly one backend call for the descriptor and
/// classifies the outcome. The token is a cooperative cancellation signal;
/// an in-flight call is never forcibly interrupted.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Executes one operation against the backend.
    async fn execute(
        &self,
        ctx: &CancellationToken,
        op: &OperationDescriptor,
    ) -> Result<(), HandlerError>;
}

/// Constructor capability for one backend family.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Builds one handler per client for a stage.
    ///
    /// `client_number` handlers are returned, each exclusively owning one of
    /// `connection_number` connections (families multiplexing clients over
    /// connections decide the mapping). For write workloads the handlers
    /// must honor the same-key-overwrite vs new-key-create distinction in
    /// the options.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if connections cannot be established; this
    /// aborts the run.
    async fn create_handlers(
        &self,
        opts: &BenchmarkOptions,
        client_number: i64,
        connection_number: i64,
    ) -> Result<Vec<Box<dyn RequestHandler>>, ConnectError>;

    /// Builds handlers that open a short-lived connection per request.
    ///
    /// Used by the read-oneshot workload. The default keeps connections
    /// alive, for families where per-request setup is not meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if connections cannot be established.
    async fn create_oneshot_handlers(
        &self,
        opts: &BenchmarkOptions,
        client_number: i64,
        connection_number: i64,
    ) -> Result<Vec<Box<dyn RequestHandler>>, ConnectError> {
        self.create_handlers(opts, client_number, connection_number)
            .await
    }

    /// Writes one key/value pair through a short-lived connection.
    ///
    /// Used by the read-setup phase; the caller retries transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the write fails.
    async fn oneshot_put(&self, key: Bytes, value: Bytes) -> Result<(), HandlerError>;

    /// Counts keys per endpoint after a write workload.
    ///
    /// Purely diagnostic; failures are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the backend cannot be queried.
    async fn total_keys(&self) -> Result<HashMap<String, i64>, HandlerError> {
        Ok(HashMap::new())
    }
}

/// Notifies remote load-generating peers of stage transitions.
#[async_trait]
pub trait PeerNotifier: Send + Sync {
    /// Broadcasts that a stage with `client_number` clients is starting.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when any peer cannot be reached; the run is
    /// aborted because an uninformed peer compromises result validity.
    async fn broadcast_heartbeat(
        &self,
        backend: BackendId,
        client_number: i64,
    ) -> Result<(), NotifyError>;
}

/// Notifier for single-machine runs with no peers to inform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeers;

#[async_trait]
impl PeerNotifier for NoPeers {
    async fn broadcast_heartbeat(
        &self,
        _backend: BackendId,
        _client_number: i64,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Lookup table from validated backend id to factory.
///
/// Resolved once at configuration-resolution time; backend families register
/// here instead of being re-dispatched per call.
#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<BackendId, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in memory backend registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            BackendId::Memory,
            Arc::new(crate::memory::MemoryBackend::new()),
        );
        registry
    }

    /// Registers (or replaces) the factory for a backend family.
    pub fn register(&mut self, id: BackendId, factory: Arc<dyn BackendFactory>) {
        self.factories.insert(id, factory);
    }

    /// Resolves the factory for `id`.
    #[must_use]
    pub fn resolve(&self, id: BackendId) -> Option<Arc<dyn BackendFactory>> {
        self.factories.get(&id).cloned()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
