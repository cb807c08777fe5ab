//! Stampede driver: the benchmark engine of the stampede harness.
//!
//! Drives configurable read/write workloads against interchangeable backend
//! families, measures per-request latency, and merges multi-stage runs into
//! one combined report.
//!
//! # Architecture
//!
//! A run flows through a fixed pipeline:
//!
//! 1. The [stage stepper](stage::StageStepper) partitions the request budget
//!    across the configured client-number stages.
//! 2. Per stage, a [request generator](generator) feeds rate-limited
//!    [`OperationDescriptor`](stampede_core::OperationDescriptor)s into a
//!    shared bounded queue, then closes it.
//! 3. A [worker pool](driver::BenchmarkDriver) of one worker per backend
//!    connection drains the queue and records latency samples.
//! 4. The stage reports are merged into a
//!    [`CombinedReport`](stampede_core::CombinedReport).
//!
//! Backend families plug in through the [`backend`] capability traits; the
//! in-process [`memory`] backend is the reference implementation and the
//! fixture for the integration tests.
//!
//! # Example
//!
//! ```no_run
//! use stampede_driver::backend::{BackendId, BackendRegistry, NoPeers};
//! use stampede_driver::options::BenchmarkOptions;
//! use stampede_driver::runner::run_benchmark;
//! use stampede_core::Workload;
//!
//! # #[tokio::main] async fn main() -> Result<(), stampede_driver::error::BenchError> {
//! let opts = BenchmarkOptions {
//!     backend: BackendId::Memory,
//!     workload: Workload::Write,
//!     request_number: 10_000,
//!     ..BenchmarkOptions::default()
//! };
//! let registry = BackendRegistry::with_defaults();
//! let report = run_benchmark(&opts, &registry, &NoPeers).await?;
//! println!("rps: {:.1}", report.rps);
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod driver;
pub mod error;
pub mod generator;
pub mod limiter;
pub mod memory;
pub mod options;
pub mod runner;
pub mod stage;

pub use backend::{BackendFactory, BackendId, BackendRegistry, NoPeers, PeerNotifier, RequestHandler};
pub use driver::BenchmarkDriver;
pub use error::BenchError;
pub use options::BenchmarkOptions;
pub use runner::run_benchmark;
pub use stage::{assign_requests, Stage, StageStepper};
