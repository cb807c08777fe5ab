//! End-to-end benchmark runs against the in-process memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stampede_core::{CombinedReport, Workload};
use stampede_driver::backend::{
    BackendFactory, BackendId, BackendRegistry, ConnectError, HandlerError, NoPeers,
    NotifyError, PeerNotifier, RequestHandler,
};
use stampede_driver::error::BenchError;
use stampede_driver::memory::MemoryBackend;
use stampede_driver::options::BenchmarkOptions;
use stampede_driver::runner::run_benchmark;
use stampede_driver::stage::StageStepper;
use stampede_core::ValuePool;

fn write_opts(requests: i64) -> BenchmarkOptions {
    BenchmarkOptions {
        backend: BackendId::Memory,
        workload: Workload::Write,
        request_number: requests,
        client_number: 1,
        connection_number: 1,
        key_size: 8,
        value_size: 32,
        ..BenchmarkOptions::default()
    }
}

fn registry_with(backend: MemoryBackend) -> (Arc<MemoryBackend>, BackendRegistry) {
    let backend = Arc::new(backend);
    let mut registry = BackendRegistry::new();
    registry.register(BackendId::Memory, backend.clone());
    (backend, registry)
}

#[tokio::test]
async fn single_stage_write_collects_every_sample() {
    let (backend, registry) = registry_with(MemoryBackend::new());
    let opts = write_opts(100);

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();

    assert_eq!(report.lats.len(), 100);
    assert!(report.error_dist.is_empty());
    report.validate().unwrap();
    assert!(report.slowest >= report.fastest);
    assert!(report.rps > 0.0);
    // Sequential keys: every request created a distinct key.
    assert_eq!(backend.key_count().await, 100);
}

#[tokio::test]
async fn staged_write_partitions_budget_and_merges_reports() {
    let (backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        connection_client_numbers: vec![5, 10],
        ..write_opts(150)
    };

    let factory = registry.resolve(BackendId::Memory).unwrap();
    let pool = ValuePool::generate(opts.value_size, 1);
    let stepper = StageStepper::new(&opts, &factory, &NoPeers, &pool, None);
    let outcome = stepper.run().await.unwrap();

    // Proportional partition: [50, 100].
    assert_eq!(outcome.client_numbers, vec![5, 10]);
    assert_eq!(outcome.reports[0].lats.len(), 50);
    assert_eq!(outcome.reports[1].lats.len(), 100);

    // No key is reused across the stage boundary.
    assert_eq!(backend.key_count().await, 150);

    let combined =
        CombinedReport::combine(&outcome.reports, &outcome.client_numbers).unwrap();
    assert_eq!(combined.lats.len(), 150);
    assert_eq!(
        combined.time_series.len(),
        combined.client_number_at_sample.len()
    );
    let fives = combined
        .client_number_at_sample
        .iter()
        .filter(|&&n| n == 5)
        .count();
    let tens = combined
        .client_number_at_sample
        .iter()
        .filter(|&&n| n == 10)
        .count();
    assert_eq!(fives, outcome.reports[0].time_series.len());
    assert_eq!(tens, outcome.reports[1].time_series.len());
}

#[tokio::test]
async fn same_key_write_touches_a_single_key() {
    let (backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        same_key: true,
        ..write_opts(50)
    };

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();
    assert_eq!(report.lats.len(), 50);
    assert_eq!(backend.key_count().await, 1);
}

#[tokio::test]
async fn read_workload_seeds_its_key_then_succeeds() {
    let (backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        workload: Workload::Read,
        client_number: 4,
        connection_number: 4,
        ..write_opts(80)
    };

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();
    assert_eq!(report.lats.len(), 80);
    assert!(report.error_dist.is_empty(), "{:?}", report.error_dist);
    // Only the setup key was written.
    assert_eq!(backend.key_count().await, 1);
}

#[tokio::test]
async fn read_oneshot_workload_runs_clean() {
    let (_backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        workload: Workload::ReadOneshot,
        ..write_opts(30)
    };

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();
    assert_eq!(report.lats.len(), 30);
    assert!(report.error_dist.is_empty());
}

#[tokio::test]
async fn injected_failures_land_in_the_error_histogram() {
    let (_backend, registry) = registry_with(MemoryBackend::new().with_failure_every(10));
    let opts = write_opts(100);

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();
    assert_eq!(report.lats.len(), 90);
    let errors: i64 = report.error_dist.values().sum();
    assert_eq!(errors, 10);
    assert_eq!(report.error_dist["backend unavailable: injected failure"], 10);
}

#[tokio::test]
async fn unregistered_backend_is_fatal_before_any_connection() {
    let registry = BackendRegistry::with_defaults();
    let opts = BenchmarkOptions {
        backend: BackendId::Consul,
        ..write_opts(10)
    };

    let err = run_benchmark(&opts, &registry, &NoPeers).await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::UnregisteredBackend {
            backend: BackendId::Consul
        }
    ));
}

/// Factory whose setup writes always fail, to exercise the retry bound.
#[derive(Default)]
struct BrokenSetup {
    put_attempts: AtomicU32,
}

#[async_trait]
impl BackendFactory for BrokenSetup {
    async fn create_handlers(
        &self,
        _opts: &BenchmarkOptions,
        _client_number: i64,
        _connection_number: i64,
    ) -> Result<Vec<Box<dyn RequestHandler>>, ConnectError> {
        Ok(Vec::new())
    }

    async fn oneshot_put(&self, _key: Bytes, _value: Bytes) -> Result<(), HandlerError> {
        self.put_attempts.fetch_add(1, Ordering::Relaxed);
        Err(HandlerError::Unavailable("seed node down".to_string()))
    }
}

#[tokio::test]
async fn read_setup_aborts_after_bounded_retries() {
    let factory = Arc::new(BrokenSetup::default());
    let mut registry = BackendRegistry::new();
    registry.register(BackendId::Memory, factory.clone());
    let opts = BenchmarkOptions {
        workload: Workload::Read,
        ..write_opts(10)
    };

    let err = run_benchmark(&opts, &registry, &NoPeers).await.unwrap_err();
    assert!(matches!(err, BenchError::SetupFailed { attempts: 7, .. }));
    assert_eq!(factory.put_attempts.load(Ordering::Relaxed), 7);
}

/// Notifier standing in for unreachable load-generating peers.
struct DeafPeers;

#[async_trait]
impl PeerNotifier for DeafPeers {
    async fn broadcast_heartbeat(
        &self,
        _backend: BackendId,
        _client_number: i64,
    ) -> Result<(), NotifyError> {
        Err(NotifyError {
            reason: "peer 10.0.0.2 unreachable".to_string(),
        })
    }
}

#[tokio::test]
async fn failed_heartbeat_aborts_the_run() {
    let (backend, registry) = registry_with(MemoryBackend::new());
    let opts = write_opts(100);

    let err = run_benchmark(&opts, &registry, &DeafPeers).await.unwrap_err();
    assert!(matches!(err, BenchError::Heartbeat(_)));
    // The stage never started.
    assert_eq!(backend.key_count().await, 0);
}

#[tokio::test]
async fn heartbeat_runs_once_per_stage() {
    struct CountingPeers(AtomicU32);

    #[async_trait]
    impl PeerNotifier for CountingPeers {
        async fn broadcast_heartbeat(
            &self,
            _backend: BackendId,
            _client_number: i64,
        ) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    let (_backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        connection_client_numbers: vec![2, 3, 5],
        ..write_opts(100)
    };
    let notifier = CountingPeers(AtomicU32::new(0));

    run_benchmark(&opts, &registry, &notifier).await.unwrap();
    assert_eq!(notifier.0.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn rate_limited_run_still_delivers_the_full_budget() {
    let (_backend, registry) = registry_with(MemoryBackend::new());
    let opts = BenchmarkOptions {
        rate_limit: 10_000,
        ..write_opts(200)
    };

    let report = run_benchmark(&opts, &registry, &NoPeers).await.unwrap();
    assert_eq!(report.lats.len(), 200);
}

#[tokio::test]
async fn total_keys_diagnostic_failure_does_not_affect_the_report() {
    struct NoDiagnostics {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl BackendFactory for NoDiagnostics {
        async fn create_handlers(
            &self,
            opts: &BenchmarkOptions,
            client_number: i64,
            connection_number: i64,
        ) -> Result<Vec<Box<dyn RequestHandler>>, ConnectError> {
            self.inner
                .create_handlers(opts, client_number, connection_number)
                .await
        }

        async fn oneshot_put(&self, key: Bytes, value: Bytes) -> Result<(), HandlerError> {
            self.inner.oneshot_put(key, value).await
        }

        async fn total_keys(&self) -> Result<HashMap<String, i64>, HandlerError> {
            Err(HandlerError::Other("stats endpoint disabled".to_string()))
        }
    }

    let mut registry = BackendRegistry::new();
    registry.register(
        BackendId::Memory,
        Arc::new(NoDiagnostics {
            inner: MemoryBackend::new(),
        }),
    );

    let report = run_benchmark(&write_opts(40), &registry, &NoPeers)
        .await
        .unwrap();
    assert_eq!(report.lats.len(), 40);
}
