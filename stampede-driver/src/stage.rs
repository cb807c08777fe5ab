//! Stage planning and sequential stage execution.
//!
//! A benchmark run is split into stages with different client counts. The
//! stepper partitions the request budget, runs stages strictly one after
//! another, and defers statistics merging until every stage has finished.

use std::sync::Arc;

use bytes::Bytes;
use stampede_core::{StageReport, ValuePool, Workload};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{BackendFactory, PeerNotifier};
use crate::driver::BenchmarkDriver;
use crate::error::BenchError;
use crate::generator::generate_requests;
use crate::options::BenchmarkOptions;

/// One phase of a run, produced per iteration by the stepper.
///
/// Passed by value into stage execution; there is no shared mutable
/// configuration object across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Concurrent clients (workers) for this stage.
    pub client_number: i64,
    /// Backend connections for this stage.
    pub connection_number: i64,
    /// This stage's share of the request budget.
    pub request_number: i64,
    /// Cumulative requests of prior stages; sequential keys continue from
    /// here so no key repeats across stage boundaries.
    pub start_index_offset: i64,
}

impl Stage {
    /// The degenerate single stage spanning the whole request budget.
    #[must_use]
    pub const fn single(opts: &BenchmarkOptions) -> Self {
        Self {
            client_number: opts.client_number,
            connection_number: opts.connection_number,
            request_number: opts.request_number,
            start_index_offset: 0,
        }
    }
}

/// Partitions `total` requests across stages, proportionally to each
/// stage's client number.
///
/// Fractional shares are floored and the leftover is handed out one request
/// per stage starting from the first, so the parts always sum to `total`
/// exactly (e.g. total=150 over clients `[5, 10]` gives `[50, 100]`).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn assign_requests(client_numbers: &[i64], total: i64) -> Vec<i64> {
    if client_numbers.is_empty() {
        return Vec::new();
    }
    let weight_sum: i64 = client_numbers.iter().sum();
    let mut parts: Vec<i64> = client_numbers
        .iter()
        .map(|&n| ((total as f64) * (n as f64) / (weight_sum as f64)) as i64)
        .collect();

    let mut leftover = total - parts.iter().sum::<i64>();
    let mut i = 0;
    while leftover > 0 {
        let idx = i % parts.len();
        parts[idx] += 1;
        leftover -= 1;
        i += 1;
    }
    parts
}

/// Plans the stage sequence for an option set.
///
/// An empty client-number sequence degenerates to one stage spanning the
/// entire budget.
#[must_use]
pub fn plan_stages(opts: &BenchmarkOptions) -> Vec<Stage> {
    if opts.connection_client_numbers.is_empty() {
        return vec![Stage::single(opts)];
    }
    let parts = assign_requests(&opts.connection_client_numbers, opts.request_number);
    let mut offset = 0;
    opts.connection_client_numbers
        .iter()
        .zip(&parts)
        .map(|(&clients, &requests)| {
            let stage = Stage {
                client_number: clients,
                connection_number: clients,
                request_number: requests,
                start_index_offset: offset,
            };
            offset += requests;
            stage
        })
        .collect()
}

/// The per-stage reports of a run, in stage order.
#[derive(Debug)]
pub struct StageOutcome {
    /// One report per stage.
    pub reports: Vec<StageReport>,
    /// The client count that produced each report.
    pub client_numbers: Vec<i64>,
}

/// Runs the planned stages of a benchmark strictly sequentially.
pub struct StageStepper<'a> {
    opts: &'a BenchmarkOptions,
    factory: &'a Arc<dyn BackendFactory>,
    notifier: &'a dyn PeerNotifier,
    pool: &'a ValuePool,
    /// Setup key targeted by read workloads.
    read_key: Option<Bytes>,
}

impl<'a> StageStepper<'a> {
    /// Creates a stepper over one run's collaborators.
    #[must_use]
    pub fn new(
        opts: &'a BenchmarkOptions,
        factory: &'a Arc<dyn BackendFactory>,
        notifier: &'a dyn PeerNotifier,
        pool: &'a ValuePool,
        read_key: Option<Bytes>,
    ) -> Self {
        Self {
            opts,
            factory,
            notifier,
            pool,
            read_key,
        }
    }

    /// Runs every planned stage to completion, in order.
    ///
    /// Before each stage the peers are informed of the new client count;
    /// a failed broadcast aborts the run before any load starts.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError`] on heartbeat, connection, or generator
    /// failure. Per-request errors are absorbed into the stage reports.
    pub async fn run(&self) -> Result<StageOutcome, BenchError> {
        let stages = plan_stages(self.opts);
        let mut outcome = StageOutcome {
            reports: Vec::with_capacity(stages.len()),
            client_numbers: Vec::with_capacity(stages.len()),
        };

        for (index, stage) in stages.into_iter().enumerate() {
            info!(
                stage = index,
                clients = stage.client_number,
                requests = stage.request_number,
                "signaling peers before stage start"
            );
            self.notifier
                .broadcast_heartbeat(self.opts.backend, stage.client_number)
                .await?;

            let report = self.run_stage(stage).await?;
            info!(
                stage = index,
                completed = report.lats.len(),
                errors = report.error_dist.values().sum::<i64>(),
                "stage finished"
            );
            outcome.reports.push(report);
            outcome.client_numbers.push(stage.client_number);
        }
        Ok(outcome)
    }

    /// Runs one stage: generator, worker pool, explicit report finish.
    async fn run_stage(&self, stage: Stage) -> Result<StageReport, BenchError> {
        let handlers = match self.opts.workload {
            Workload::ReadOneshot => {
                self.factory
                    .create_oneshot_handlers(
                        self.opts,
                        stage.client_number,
                        stage.connection_number,
                    )
                    .await?
            }
            Workload::Write | Workload::Read => {
                self.factory
                    .create_handlers(self.opts, stage.client_number, stage.connection_number)
                    .await?
            }
        };

        if handlers.is_empty() {
            return Err(crate::backend::ConnectError {
                backend: self.opts.backend,
                reason: "factory returned no handlers".to_string(),
            }
            .into());
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (queue_tx, queue_rx) =
            async_channel::bounded(stage.client_number.max(1) as usize);
        let ctx = CancellationToken::new();

        let generator = tokio::spawn({
            let opts = self.opts.clone();
            let pool = self.pool.clone();
            let read_key = self.read_key.clone();
            let ctx = ctx.clone();
            async move {
                generate_requests(&opts, stage, &pool, read_key, queue_tx, ctx).await;
            }
        });

        let mut driver = BenchmarkDriver::new(handlers, queue_rx, ctx);
        driver.start();
        generator.await?;
        driver.wait_done().await;

        info!("finishing stage reports");
        driver.finish_report()
    }
}
