//! The benchmark run entry point.
//!
//! `run_benchmark` is the single operation the CLI and configuration layers
//! invoke per configured workload: it resolves the backend, performs the
//! workload-specific setup, steps through the stages, and merges the stage
//! reports into the final combined report.

use bytes::Bytes;
use stampede_core::{same_key, CombinedReport, ValuePool, Workload};
use tracing::{info, warn};

use crate::backend::{BackendFactory, BackendRegistry, PeerNotifier};
use crate::error::{BenchError, SETUP_ATTEMPTS};
use crate::options::BenchmarkOptions;
use crate::stage::StageStepper;

/// Runs one benchmark to completion and returns the combined report.
///
/// # Errors
///
/// Returns [`BenchError`] for fatal failures: invalid options, an
/// unregistered backend, connection or heartbeat failures, a failed read
/// setup, or an aggregation-invariant violation. Per-request errors are
/// recovered into the report's error histogram.
pub async fn run_benchmark(
    opts: &BenchmarkOptions,
    registry: &BackendRegistry,
    notifier: &dyn PeerNotifier,
) -> Result<CombinedReport, BenchError> {
    opts.validate()?;
    let factory = registry
        .resolve(opts.backend)
        .ok_or(BenchError::UnregisteredBackend {
            backend: opts.backend,
        })?;

    let pool = ValuePool::generate(opts.value_size, 1);

    let read_key = if opts.workload.is_read() {
        let key = same_key(opts.key_size);
        setup_read_key(factory.as_ref(), key.clone(), pool.pick(0)).await?;
        Some(key)
    } else {
        None
    };

    info!(
        backend = %opts.backend,
        workload = %opts.workload,
        requests = opts.request_number,
        stages = opts.connection_client_numbers.len().max(1),
        "benchmark starting"
    );

    let stepper = StageStepper::new(opts, &factory, notifier, &pool, read_key);
    let outcome = stepper.run().await?;

    info!("combining all reports");
    let combined = CombinedReport::combine(&outcome.reports, &outcome.client_numbers)?;
    info!(
        data_points = combined.lats.len(),
        total_secs = combined.total.as_secs_f64(),
        rps = combined.rps,
        "combined all reports"
    );

    if opts.workload == Workload::Write {
        report_total_keys(opts, factory.as_ref()).await;
    }

    Ok(combined)
}

/// Writes the key every read will target, through a short-lived connection.
///
/// Retried a bounded number of times; running a read benchmark without the
/// key in place would measure nothing but misses.
async fn setup_read_key(
    factory: &dyn BackendFactory,
    key: Bytes,
    value: Bytes,
) -> Result<(), BenchError> {
    let mut result = Ok(());
    for attempt in 1..=SETUP_ATTEMPTS {
        result = factory.oneshot_put(key.clone(), value.clone()).await;
        match &result {
            Ok(()) => {
                info!(attempt, "setup write done");
                break;
            }
            Err(err) => warn!(attempt, error = %err, "setup write failed"),
        }
    }
    result.map_err(|last| BenchError::SetupFailed {
        attempts: SETUP_ATTEMPTS,
        last,
    })
}

/// Post-write diagnostic: ask the backend how many keys each endpoint holds.
async fn report_total_keys(opts: &BenchmarkOptions, factory: &dyn BackendFactory) {
    match factory.total_keys().await {
        Ok(totals) => {
            for (endpoint, keys) in totals {
                info!(
                    expected = opts.request_number,
                    endpoint = %endpoint,
                    keys,
                    "write total on backend"
                );
            }
        }
        Err(err) => warn!(error = %err, "total-keys check failed; report unaffected"),
    }
}
