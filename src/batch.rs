//! Best-effort concurrent batches
//!
//! Install precache, predictive prefetch and ad-hoc precache all share the
//! same failure policy: run every operation concurrently, keep whatever
//! succeeded, and never let one failure abort the group. This helper is the
//! single implementation of that policy.

use crate::error::Result;
use std::future::Future;
use tracing::debug;

/// Outcome of a best-effort batch
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Results of the operations that succeeded, in completion order
    pub succeeded: Vec<T>,
    /// Number of operations that failed
    pub failed: usize,
}

impl<T> BatchOutcome<T> {
    /// Total number of operations the batch ran
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed
    }
}

/// Run a group of independent fallible operations concurrently
///
/// Each task runs on its own spawned future. Failures (and panics) are
/// logged at debug level and counted, never propagated.
pub async fn best_effort<T, F>(label: &str, tasks: Vec<F>) -> BatchOutcome<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let handles: Vec<_> = tasks.into_iter().map(tokio::spawn).collect();

    let mut succeeded = Vec::new();
    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(value)) => succeeded.push(value),
            Ok(Err(e)) => {
                failed += 1;
                debug!(batch = %label, error = %e, "batch operation failed");
            }
            Err(e) => {
                failed += 1;
                debug!(batch = %label, error = %e, "batch operation aborted");
            }
        }
    }

    debug!(
        batch = %label,
        succeeded = succeeded.len(),
        failed,
        "batch complete"
    );

    BatchOutcome { succeeded, failed }
}
