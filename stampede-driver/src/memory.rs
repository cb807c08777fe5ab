//! In-process reference backend.
//!
//! A keyspace behind a `tokio::sync::RwLock`, exposed through the same
//! capability traits external backend families implement. Used by the CLI
//! demo mode and as the fixture for the integration tests; failure injection
//! and artificial latency make error-path behavior reproducible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use stampede_core::{OpKind, OperationDescriptor};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendFactory, ConnectError, HandlerError, RequestHandler};
use crate::options::BenchmarkOptions;

type Store = Arc<RwLock<HashMap<Bytes, Bytes>>>;

/// Factory for the in-process memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: Store,
    /// Fail every n-th request per handler; 0 disables injection.
    fail_every: u64,
    /// Artificial latency added to every call.
    latency: Duration,
}

impl MemoryBackend {
    /// Creates a backend with no injected failures or latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a failure on every `n`-th request of each handler.
    #[must_use]
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Adds fixed artificial latency to every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of keys currently stored.
    pub async fn key_count(&self) -> usize {
        self.store.read().await.len()
    }
}

#[async_trait]
impl BackendFactory for MemoryBackend {
    async fn create_handlers(
        &self,
        _opts: &BenchmarkOptions,
        client_number: i64,
        _connection_number: i64,
    ) -> Result<Vec<Box<dyn RequestHandler>>, ConnectError> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let handlers = (0..client_number.max(0) as usize)
            .map(|_| {
                Box::new(MemoryHandler {
                    store: Arc::clone(&self.store),
                    fail_every: self.fail_every,
                    latency: self.latency,
                    calls: AtomicU64::new(0),
                }) as Box<dyn RequestHandler>
            })
            .collect();
        Ok(handlers)
    }

    async fn oneshot_put(&self, key: Bytes, value: Bytes) -> Result<(), HandlerError> {
        self.store.write().await.insert(key, value);
        Ok(())
    }

    async fn total_keys(&self) -> Result<HashMap<String, i64>, HandlerError> {
        #[allow(clippy::cast_possible_wrap)]
        let count = self.store.read().await.len() as i64;
        Ok(HashMap::from([("memory".to_string(), count)]))
    }
}

/// One simulated connection to the memory backend.
struct MemoryHandler {
    store: Store,
    fail_every: u64,
    latency: Duration,
    calls: AtomicU64,
}

#[async_trait]
impl RequestHandler for MemoryHandler {
    async fn execute(
        &self,
        _ctx: &CancellationToken,
        op: &OperationDescriptor,
    ) -> Result<(), HandlerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(HandlerError::Unavailable("injected failure".to_string()));
        }

        match op.kind {
            OpKind::Put => {
                let value = op.value.clone().ok_or_else(|| {
                    HandlerError::InvalidOperation("put without value".to_string())
                })?;
                self.store.write().await.insert(op.key.clone(), value);
                Ok(())
            }
            OpKind::Get => {
                if self.store.read().await.contains_key(&op.key) {
                    Ok(())
                } else {
                    Err(HandlerError::KeyNotFound)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handlers_share_one_keyspace() {
        let backend = MemoryBackend::new();
        let opts = BenchmarkOptions::default();
        let handlers = backend.create_handlers(&opts, 2, 2).await.unwrap();
        let ctx = CancellationToken::new();

        let put = OperationDescriptor::put(Bytes::from_static(b"k1"), Bytes::from_static(b"v"));
        handlers[0].execute(&ctx, &put).await.unwrap();

        let get = OperationDescriptor::get(Bytes::from_static(b"k1"), false);
        handlers[1].execute(&ctx, &get).await.unwrap();
        assert_eq!(backend.key_count().await, 1);
    }

    #[tokio::test]
    async fn missing_key_reads_are_classified() {
        let backend = MemoryBackend::new();
        let opts = BenchmarkOptions::default();
        let handlers = backend.create_handlers(&opts, 1, 1).await.unwrap();
        let ctx = CancellationToken::new();

        let get = OperationDescriptor::get(Bytes::from_static(b"absent"), false);
        let err = handlers[0].execute(&ctx, &get).await.unwrap_err();
        assert!(matches!(err, HandlerError::KeyNotFound));
    }

    #[tokio::test]
    async fn failure_injection_fires_on_schedule() {
        let backend = MemoryBackend::new().with_failure_every(3);
        let opts = BenchmarkOptions::default();
        let handlers = backend.create_handlers(&opts, 1, 1).await.unwrap();
        let ctx = CancellationToken::new();

        let mut failures = 0;
        for i in 0..9 {
            let put = OperationDescriptor::put(
                stampede_core::sequential_key(4, i),
                Bytes::from_static(b"v"),
            );
            if handlers[0].execute(&ctx, &put).await.is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn oneshot_put_seeds_the_store() {
        let backend = MemoryBackend::new();
        backend
            .oneshot_put(Bytes::from_static(b"seed"), Bytes::from_static(b"v"))
            .await
            .unwrap();
        let totals = backend.total_keys().await.unwrap();
        assert_eq!(totals["memory"], 1);
    }
}
