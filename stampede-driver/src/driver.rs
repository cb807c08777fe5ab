//! Worker pool that executes requests and records latencies.
//!
//! The driver owns exactly one worker per request handler (and therefore per
//! backend connection). Workers drain the shared queue until it is closed
//! and empty; per-request failures are recorded and never stop the pool.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use parking_lot::Mutex;
use stampede_core::{report::unix_now, Collector, OperationDescriptor, Sample, StageReport};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::backend::RequestHandler;
use crate::error::BenchError;

/// Lifecycle of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Workers not yet spawned.
    NotStarted,
    /// Workers draining the queue.
    Running,
    /// Queue closed; workers finishing in-flight calls.
    Draining,
    /// Every worker has observed queue closure and returned.
    Finished,
}

impl DriverState {
    const fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        }
    }
}

/// Drives one stage: a fixed worker pool over a shared request queue.
pub struct BenchmarkDriver {
    handlers: Vec<Box<dyn RequestHandler>>,
    queue: Receiver<OperationDescriptor>,
    collector: Arc<Mutex<Collector>>,
    ctx: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    state: DriverState,
    started_at: Option<Instant>,
}

impl BenchmarkDriver {
    /// Creates a driver with one worker per handler.
    #[must_use]
    pub fn new(
        handlers: Vec<Box<dyn RequestHandler>>,
        queue: Receiver<OperationDescriptor>,
        ctx: CancellationToken,
    ) -> Self {
        Self {
            handlers,
            queue,
            collector: Arc::new(Mutex::new(Collector::new())),
            ctx,
            workers: Vec::new(),
            state: DriverState::NotStarted,
            started_at: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// Spawns the workers and starts the clock.
    ///
    /// A second call is a no-op; the pool runs once.
    pub fn start(&mut self) {
        if self.state != DriverState::NotStarted {
            return;
        }
        self.started_at = Some(Instant::now());
        let client_number = self.handlers.len();
        for handler in self.handlers.drain(..) {
            let queue = self.queue.clone();
            let collector = Arc::clone(&self.collector);
            let ctx = self.ctx.clone();
            self.workers
                .push(tokio::spawn(worker_loop(handler, queue, collector, ctx)));
        }
        self.state = DriverState::Running;
        debug!(workers = client_number, "worker pool started");
    }

    /// Blocks until every worker has observed queue closure and returned.
    pub async fn wait_done(&mut self) {
        if self.state == DriverState::NotStarted || self.state == DriverState::Finished {
            return;
        }
        self.state = DriverState::Draining;
        for worker in self.workers.drain(..) {
            // Worker bodies never panic; a JoinError here means the task was
            // aborted externally, in which case its samples are already in.
            let _ = worker.await;
        }
        self.state = DriverState::Finished;
        debug!("worker pool finished");
    }

    /// Materializes the stage report.
    ///
    /// Separate from [`wait_done`](Self::wait_done): it reads the shared
    /// accumulator and therefore requires every worker to have returned.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::ReportsNotReady`] if called before the pool
    /// reached [`DriverState::Finished`].
    pub fn finish_report(&mut self) -> Result<StageReport, BenchError> {
        if self.state != DriverState::Finished {
            return Err(BenchError::ReportsNotReady {
                state: self.state.name(),
            });
        }
        let total = self
            .started_at
            .map_or(Duration::ZERO, |started| started.elapsed());
        let collector = std::mem::take(&mut self.collector);
        let collector = Arc::try_unwrap(collector)
            .map(Mutex::into_inner)
            .unwrap_or_else(|shared| std::mem::take(&mut *shared.lock()));
        Ok(collector.finish(total))
    }
}

/// One worker: dequeue, execute, record, repeat until the queue closes.
async fn worker_loop(
    handler: Box<dyn RequestHandler>,
    queue: Receiver<OperationDescriptor>,
    collector: Arc<Mutex<Collector>>,
    ctx: CancellationToken,
) {
    while let Ok(op) = queue.recv().await {
        let start = Instant::now();
        let result = handler.execute(&ctx, &op).await;
        let sample = Sample {
            latency_secs: start.elapsed().as_secs_f64(),
            unix_second: unix_now(),
            error: result.err().map(|e| e.to_string()),
        };
        if sample.error.is_some() {
            trace!(error = sample.error.as_deref(), "request failed");
        }
        collector.lock().record(sample);
    }
}
