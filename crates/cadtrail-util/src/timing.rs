//! Scoped timing of document and history operations.
//!
//! ```rust,ignore
//! let _timing = TimingGuard::new(Operation::Rollback, snapshot_id);
//! // duration is logged when `_timing` goes out of scope
//! ```

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Operations worth timing, each with its own idea of "slow".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Walking the live feature tree.
    Capture,
    /// Capturing and persisting a snapshot.
    Commit,
    /// Applying a snapshot to the live document.
    Rollback,
    /// Importing legacy flat-file history.
    Migration,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Capture => "capture",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
            Operation::Migration => "migration",
        }
    }

    /// `(info, warn)` thresholds.
    fn thresholds(&self) -> (Duration, Duration) {
        match self {
            Operation::Capture => (Duration::from_millis(250), Duration::from_secs(2)),
            Operation::Commit => (Duration::from_millis(500), Duration::from_secs(3)),
            Operation::Rollback => (Duration::from_millis(500), Duration::from_secs(5)),
            Operation::Migration => (Duration::from_secs(1), Duration::from_secs(30)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs how long an operation took when dropped.
///
/// Fast operations log at debug, slower ones at info and slow ones at warn.
pub struct TimingGuard {
    operation: Operation,
    subject: String,
    start: Instant,
    info_after: Duration,
    warn_after: Duration,
}

impl TimingGuard {
    /// Start timing `operation` on `subject` (a document path or snapshot id).
    pub fn new(operation: Operation, subject: impl Into<String>) -> Self {
        let (info_after, warn_after) = operation.thresholds();
        Self {
            operation,
            subject: subject.into(),
            start: Instant::now(),
            info_after,
            warn_after,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let operation = self.operation.as_str();
        let subject = self.subject.as_str();

        if elapsed >= self.warn_after {
            warn!(operation, subject, elapsed_ms, "Slow {operation}");
        } else if elapsed >= self.info_after {
            info!(operation, subject, elapsed_ms, "Finished {operation}");
        } else {
            debug!(operation, subject, elapsed_ms, "Finished {operation}");
        }
    }
}
