//! Benchmark run configuration.

use serde::{Deserialize, Serialize};
use stampede_core::Workload;

use crate::backend::BackendId;

/// Options for one benchmark run.
///
/// Read-only for the duration of a run: per-stage sizing is carried by
/// [`Stage`](crate::stage::Stage) values produced by the stepper rather than
/// by mutating this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BenchmarkOptions {
    /// Backend family under test.
    pub backend: BackendId,
    /// Backend endpoints handed to the connection factory.
    pub database_endpoints: Vec<String>,
    /// Workload type to drive.
    pub workload: Workload,
    /// Total number of requests across all stages.
    pub request_number: i64,
    /// Concurrent clients (workers) when no stage sequence is configured.
    pub client_number: i64,
    /// Backend connections when no stage sequence is configured.
    pub connection_number: i64,
    /// Client counts per stage; empty means a single fixed-size stage.
    pub connection_client_numbers: Vec<i64>,
    /// Key size in bytes.
    pub key_size: usize,
    /// Value size in bytes.
    pub value_size: usize,
    /// Write the same key on every request instead of sequential keys.
    pub same_key: bool,
    /// Allow reads to be served without linearization.
    pub stale_read: bool,
    /// Target request rate in requests/second; 0 disables rate limiting.
    pub rate_limit: u64,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            backend: BackendId::Memory,
            database_endpoints: Vec::new(),
            workload: Workload::Write,
            request_number: 1,
            client_number: 1,
            connection_number: 1,
            connection_client_numbers: Vec::new(),
            key_size: 8,
            value_size: 256,
            same_key: false,
            stale_read: false,
            rate_limit: 0,
        }
    }
}

/// Rejected option combinations, fatal before any connection is made.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// Request number must be positive.
    #[error("request number must be positive, got {0}")]
    NonPositiveRequests(i64),

    /// Client or connection counts must be positive.
    #[error("{what} must be positive, got {got}")]
    NonPositiveCount {
        /// Which count was invalid.
        what: &'static str,
        /// The offending value.
        got: i64,
    },

    /// Key and value sizes must be positive.
    #[error("{what} must be positive")]
    EmptySize {
        /// Which size was zero.
        what: &'static str,
    },

    /// More stages than requests to distribute.
    #[error("{stages} stages cannot split {requests} requests")]
    TooManyStages {
        /// Configured stage count.
        stages: usize,
        /// Configured total request count.
        requests: i64,
    },
}

impl BenchmarkOptions {
    /// Validates the option set before a run.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] on the first invalid field found.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.request_number < 1 {
            return Err(OptionsError::NonPositiveRequests(self.request_number));
        }
        for (what, got) in [
            ("client number", self.client_number),
            ("connection number", self.connection_number),
        ] {
            if got < 1 {
                return Err(OptionsError::NonPositiveCount { what, got });
            }
        }
        for &n in &self.connection_client_numbers {
            if n < 1 {
                return Err(OptionsError::NonPositiveCount {
                    what: "stage client number",
                    got: n,
                });
            }
        }
        if self.key_size == 0 {
            return Err(OptionsError::EmptySize { what: "key size" });
        }
        if self.value_size == 0 {
            return Err(OptionsError::EmptySize { what: "value size" });
        }
        let stages = self.connection_client_numbers.len();
        if stages as i64 > self.request_number {
            return Err(OptionsError::TooManyStages {
                stages,
                requests: self.request_number,
            });
        }
        Ok(())
    }
}
