//! Per-call timeout for oracles that may hang.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use skinmatch_core::{ComparisonResult, Oracle};
use tracing::warn;

/// Runs every comparison of an inner oracle on its own thread and turns an
/// overrun into an oracle failure.
///
/// A comparison that times out keeps running in the background until the
/// inner oracle returns; its result is discarded.
pub struct TimeoutOracle {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
}

impl TimeoutOracle {
    pub fn new(inner: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Oracle for TimeoutOracle {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let (query_path, candidate_path) = (query.to_path_buf(), candidate.to_path_buf());

        let spawned = thread::Builder::new()
            .name("skinmatch-oracle".to_string())
            .spawn(move || {
                let _ = tx.send(inner.compare(&query_path, &candidate_path));
            });
        if let Err(err) = spawned {
            return ComparisonResult::failure(
                query,
                candidate,
                format!("failed to start comparison: {err}"),
            );
        }

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    query = %query.display(),
                    candidate = %candidate.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Comparison timed out"
                );
                ComparisonResult::failure(
                    query,
                    candidate,
                    format!("timed out after {} ms", self.timeout.as_millis()),
                )
            }
            Err(RecvTimeoutError::Disconnected) => {
                ComparisonResult::failure(query, candidate, "comparison aborted")
            }
        }
    }
}
