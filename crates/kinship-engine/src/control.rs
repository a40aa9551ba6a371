//! Cancellation and deadlines for long-running scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// How often (in pair comparisons or rule iterations) scans poll the control.
pub const CHECK_INTERVAL: usize = 256;

/// Shared cancel flag plus an optional deadline.
///
/// Clones share the flag, so a caller can keep one handle and cancel a scan
/// running elsewhere.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    limit: Option<Duration>,
    operation: &'static str,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self.limit = Some(limit);
        self
    }

    /// Apply a timeout unless one was already set.
    pub fn or_timeout(self, limit: Duration) -> Self {
        if self.deadline.is_some() {
            self
        } else {
            self.with_timeout(limit)
        }
    }

    pub(crate) fn for_operation(mut self, operation: &'static str) -> Self {
        self.operation = operation;
        self
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Fail with `Cancelled` or `Timeout` when the scan must stop.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled {
                operation: self.operation.to_string(),
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout {
                    max_seconds: self.limit.map(|l| l.as_secs()).unwrap_or(0),
                });
            }
        }
        Ok(())
    }
}
