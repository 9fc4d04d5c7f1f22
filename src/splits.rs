use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::constants::windows::{TESTING_END, TESTING_START, TRAINING_END, TRAINING_START};
use crate::errors::EvalError;

/// Logical dataset partitions selected by an item's seed time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetWindow {
    /// Items seeded inside the training range.
    Training,
    /// Items seeded inside the testing range.
    Testing,
    /// Every seeded item.
    All,
}

/// Half-open `[start, end)` seed-time range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: NaiveDateTime,
    /// Exclusive end.
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Range covering whole days from `start` up to (not including) `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.and_time(chrono::NaiveTime::MIN),
            end: end.and_time(chrono::NaiveTime::MIN),
        }
    }

    /// True when `at` lies inside the range.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end
    }
}

/// Training/testing ranges used to classify seed times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Training date range.
    pub training: TimeRange,
    /// Testing date range.
    pub testing: TimeRange,
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            training: TimeRange::from_dates(ymd(TRAINING_START), ymd(TRAINING_END)),
            testing: TimeRange::from_dates(ymd(TESTING_START), ymd(TESTING_END)),
        }
    }
}

impl WindowBounds {
    /// Validate that each range is non-empty.
    pub fn validated(self) -> Result<Self, EvalError> {
        for (label, range) in [("training", self.training), ("testing", self.testing)] {
            if range.start >= range.end {
                return Err(EvalError::Configuration(format!(
                    "{label} window must start before it ends ({} >= {})",
                    range.start, range.end
                )));
            }
        }
        Ok(self)
    }

    /// True if a seed time falls inside `window`.
    pub fn contains(&self, window: DatasetWindow, seed_time: NaiveDateTime) -> bool {
        match window {
            DatasetWindow::Training => self.training.contains(seed_time),
            DatasetWindow::Testing => self.testing.contains(seed_time),
            DatasetWindow::All => true,
        }
    }
}

fn ymd((year, month, day): (i32, u32, u32)) -> NaiveDate {
    // Constants are valid calendar dates.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
