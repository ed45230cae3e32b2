//! Global progress and pause control.
//!
//! Global progress is always derived from the records it summarizes and is
//! never cached, so it cannot drift from the store.

use std::fmt;

use serde::Serialize;

use crate::types::{FileRecord, FileStatus};

/// Mean completion of all records, in percent.
///
/// Kept at full precision; [`Display`](fmt::Display) rounds to one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct GlobalProgress(f64);

impl GlobalProgress {
    pub fn percent(self) -> f64 {
        self.0
    }
}

impl fmt::Display for GlobalProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Per-status counts plus global progress, for table headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub queued: usize,
    pub uploading: usize,
    pub done: usize,
    pub failed: usize,
    pub global: GlobalProgress,
}

impl Summary {
    /// Files that have not reached a terminal status.
    pub fn remaining(&self) -> usize {
        self.queued + self.uploading
    }

    /// Files that reached a terminal status.
    pub fn finished(&self) -> usize {
        self.done + self.failed
    }
}

/// Derives global progress and owns the pause flag.
#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    paused: bool,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sum(progress) / (count * 100)` as a percentage; 0 for no records.
    pub fn recompute(records: &[FileRecord]) -> GlobalProgress {
        if records.is_empty() {
            return GlobalProgress(0.0);
        }
        let sum: u64 = records.iter().map(|r| u64::from(r.progress)).sum();
        GlobalProgress(sum as f64 / (records.len() as f64 * 100.0) * 100.0)
    }

    /// Counts records per status and computes global progress.
    pub fn summarize(records: &[FileRecord]) -> Summary {
        let mut summary = Summary {
            total: records.len(),
            global: Self::recompute(records),
            ..Summary::default()
        };
        for record in records {
            match record.status {
                FileStatus::Queued => summary.queued += 1,
                FileStatus::Uploading => summary.uploading += 1,
                FileStatus::Done => summary.done += 1,
                FileStatus::Error => summary.failed += 1,
            }
        }
        summary
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets the pause flag. Returns `false` if it was already set.
    pub fn pause(&mut self) -> bool {
        !std::mem::replace(&mut self.paused, true)
    }

    /// Clears the pause flag. Returns `false` if it was already clear.
    pub fn resume(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    /// Flips the pause flag and returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }
}
