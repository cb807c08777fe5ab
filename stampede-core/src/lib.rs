//! Stampede core: backend-agnostic types for database load testing.
//!
//! This crate holds the leaf data types of the stampede harness and the pure
//! computation over them:
//!
//! - [`operation`]: the backend-agnostic description of one Get/Put call and
//!   the workload taxonomy.
//! - [`keys`]: deterministic key generation and the pre-generated value pool.
//! - [`report`]: per-stage sample collection and the merge of sequential
//!   stage reports into one combined report.
//!
//! Nothing in this crate touches the network or an async runtime; the driver
//! crate (`stampede-driver`) wires these types to real backends.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod keys;
pub mod operation;
pub mod report;

pub use keys::{same_key, sequential_key, ValuePool};
pub use operation::{OpKind, OperationDescriptor, Workload};
pub use report::{
    AggregateError, Collector, CombinedReport, DataPoint, Sample, StageReport,
};
