//! Error types for matching runs.
//!
//! Only conditions that stop a run are errors. A comparison the oracle could
//! not perform is a [`CompareStatus`](crate::CompareStatus) value routed into
//! a bucket, never a [`MatchError`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort a matching run.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A configured root is missing or is not a directory.
    #[error("invalid root directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// The worker pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// A report sink rejected a row or the final report.
    #[error("report sink error: {0}")]
    Sink(String),
}

/// Convenience alias for results with [`MatchError`].
pub type Result<T> = std::result::Result<T, MatchError>;
