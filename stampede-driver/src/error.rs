//! Run-fatal error types.
//!
//! Per-request failures are recovered into the error histogram and never
//! appear here; only setup, configuration-resolution, peer-notification, and
//! aggregation-invariant failures unwind a run.

use stampede_core::AggregateError;

use crate::backend::{BackendId, ConnectError, HandlerError, NotifyError};
use crate::options::OptionsError;

/// Number of attempts for the read-setup write before the run is aborted.
pub const SETUP_ATTEMPTS: u32 = 7;

/// A fatal benchmark-run failure.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// The option set was rejected before any connection was made.
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),

    /// The configured backend id has no registered factory.
    #[error("no factory registered for backend {backend}")]
    UnregisteredBackend {
        /// The backend id that failed to resolve.
        backend: BackendId,
    },

    /// Backend connections could not be established.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The read-setup write kept failing; the run cannot proceed.
    #[error("setup write failed after {attempts} attempts: {last}")]
    SetupFailed {
        /// How many attempts were made.
        attempts: u32,
        /// The final attempt's error.
        last: HandlerError,
    },

    /// A load-generating peer could not be informed of a stage transition.
    #[error(transparent)]
    Heartbeat(#[from] NotifyError),

    /// Merging the stage reports violated an invariant.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Reports were finalized before all workers finished.
    #[error("reports finalized while workers were still {state}")]
    ReportsNotReady {
        /// The driver state at the time of the call.
        state: &'static str,
    },

    /// The request generator task failed to run to completion.
    #[error("request generator task failed: {0}")]
    Generator(#[from] tokio::task::JoinError),
}
