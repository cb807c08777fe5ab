//! Operation model for benchmark execution.
//!
//! An [`OperationDescriptor`] describes one unit of work without naming a
//! backend; per-backend handlers in the driver crate translate it into an
//! actual wire call.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The kind of call an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Read one key.
    Get,
    /// Write one key.
    Put,
}

/// A single backend-agnostic unit of work.
///
/// Descriptors are immutable once produced. The request generator owns a
/// descriptor until it is handed to a worker; after consumption it is never
/// shared.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// Whether this is a read or a write.
    pub kind: OpKind,
    /// Target key.
    pub key: Bytes,
    /// Payload for writes; absent for reads.
    pub value: Option<Bytes>,
    /// Whether a read may be served without linearization.
    pub stale_read: bool,
}

impl OperationDescriptor {
    /// Creates a read of `key`.
    #[must_use]
    pub const fn get(key: Bytes, stale_read: bool) -> Self {
        Self {
            kind: OpKind::Get,
            key,
            value: None,
            stale_read,
        }
    }

    /// Creates a write of `value` under `key`.
    #[must_use]
    pub const fn put(key: Bytes, value: Bytes) -> Self {
        Self {
            kind: OpKind::Put,
            key,
            value: Some(value),
            stale_read: false,
        }
    }
}

/// The workload type a benchmark run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workload {
    /// Put requests, sequential or same-key.
    Write,
    /// Get requests against one pre-written key, reusing connections.
    Read,
    /// Get requests where every request uses a short-lived connection.
    ReadOneshot,
}

impl Workload {
    /// Returns true for the read-flavored workload types.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadOneshot)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Write => "write",
            Self::Read => "read",
            Self::ReadOneshot => "read-oneshot",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unknown workload name.
#[derive(Debug, thiserror::Error)]
#[error("unknown workload type: {0:?} (expected write, read, or read-oneshot)")]
pub struct UnknownWorkload(String);

impl FromStr for Workload {
    type Err = UnknownWorkload;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write" => Ok(Self::Write),
            "read" => Ok(Self::Read),
            "read-oneshot" => Ok(Self::ReadOneshot),
            other => Err(UnknownWorkload(other.to_string())),
        }
    }
}
