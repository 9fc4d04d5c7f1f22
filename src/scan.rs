use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::errors::EvalError;

/// Cooperative cancellation token with an optional deadline.
///
/// Clones share the cancellation flag, so a handle kept by the caller can stop
/// a scan running elsewhere.
#[derive(Clone, Debug, Default)]
pub struct ScanControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ScanControl {
    /// Control that never trips unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Trip once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation for every clone of this control.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once `cancel` was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with `EvalError::Cancelled` if cancelled or past the deadline.
    pub fn check(&self) -> Result<(), EvalError> {
        if self.is_cancelled() {
            return Err(EvalError::Cancelled {
                reason: "cancellation requested".to_string(),
            });
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(EvalError::Cancelled {
                reason: "deadline exceeded".to_string(),
            });
        }
        Ok(())
    }
}

/// Line accounting for one or more file scans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Non-blank lines read.
    pub lines_read: usize,
    /// Lines parsed into records.
    pub records: usize,
    /// Malformed lines skipped.
    pub skipped: usize,
}

impl ScanReport {
    /// Add another report's counts into this one.
    pub fn merge(&mut self, other: ScanReport) {
        self.lines_read += other.lines_read;
        self.records += other.records;
        self.skipped += other.skipped;
    }
}
