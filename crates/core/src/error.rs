//! Error types for the dbmark harness
//!
//! One unified error enum serves the whole workspace. The variants mirror the
//! operational taxonomy of the harness rather than the libraries underneath:
//! a driver failure surfaces as `Connect`, `Migration`, or `TransientQuery`
//! depending on *when* it happened, not on which crate produced it.
//!
//! Fatality is a property of the kind:
//! - `Config`, `Connect`, `Migration`, `Capability` terminate the process
//!   (exit code 127 through the CLI's single exit path).
//! - `Predicate`, `ValueTooLong`, `UnknownField`, `UnknownType`,
//!   `DimensionMismatch` are returned to the worker function, which normally
//!   aborts the run with context.
//! - `TransientQuery` is recorded and counted as a loop miss; the worker
//!   carries on.
//! - `TransactionConflict` is surfaced to the caller; the access layer never
//!   retries on its own.
//!
//! Two conditions the distilled taxonomy deliberately does *not* model as
//! errors: an empty predicate intersection (a short-circuit signal owned by
//! the query builder) and a requested shutdown (a loop-termination cause
//! owned by the scheduler).

use thiserror::Error;

/// Result type alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all dbmark operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed connection string, unknown scheme, or missing required flag
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection establishment failed after the full retry budget
    #[error("failed to connect to {url} after {attempts} attempts: {message}")]
    Connect {
        /// Redacted connection URL (no password)
        url: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Driver-reported failure
        message: String,
    },

    /// DDL translation or execution failure
    #[error("migration failed: {0}")]
    Migration(String),

    /// Operator requested a feature the backend does not support
    #[error("backend capability missing: {0}")]
    Capability(String),

    /// WHERE/ORDER grammar violation
    #[error("predicate error: {0}")]
    Predicate(String),

    /// A bounded string value exceeded the column's maximum length
    #[error("value for field '{field}' exceeds maximum length {max}")]
    ValueTooLong {
        /// Field the oversized value was destined for
        field: String,
        /// Configured maximum length
        max: usize,
    },

    /// A query referenced a field the target table does not define
    #[error("unknown field: '{0}'")]
    UnknownField(String),

    /// No built-in or plugin generator handles a column type tag
    #[error("unknown column type tag: '{0}'")]
    UnknownType(String),

    /// A kNN query vector does not match the index mapping's dimension
    #[error("vector dimension mismatch: index has {expected}, query has {got}")]
    DimensionMismatch {
        /// Dimension declared in the index mapping
        expected: usize,
        /// Dimension of the submitted query vector
        got: usize,
    },

    /// I/O error during a non-mutating query; counted as a loop miss
    #[error("transient query error: {0}")]
    TransientQuery(String),

    /// Commit-time conflict reported by the backend
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    /// I/O error outside the query path (signal setup, local files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error terminates the process.
    ///
    /// Only configuration, connection, migration, and capability failures are
    /// fatal; everything else is handed back to the running scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Connect { .. } | Error::Migration(_) | Error::Capability(_)
        )
    }

    /// Whether this error is a commit-time conflict the caller may retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict(_))
    }

    /// Whether the worker should swallow this error and count a loop miss
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientQuery(_))
    }

    /// Process exit code used by the CLI's exit path for surfaced errors
    pub fn exit_code(&self) -> i32 {
        127
    }
}
