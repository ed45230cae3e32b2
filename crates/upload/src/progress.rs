//! Provisional per-file progress.
//!
//! The ingest endpoint resolves a transfer as one success or failure event,
//! so byte-level progress is not observable. A [`ProgressSource`] fills the
//! gap while a file is `Uploading`; the default [`SimulatedProgress`] ticks
//! a fixed step on a timer. A streaming upload API could provide a real
//! source behind the same trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::types::FileKey;

/// A progress report for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressUpdate {
    /// Add this many percentage points.
    Advance(u8),
    /// Set this absolute percentage.
    Report(u8),
}

/// Receiver of progress reports (implemented by the scheduler).
///
/// Returns `false` once the file is no longer `Uploading`.
pub(crate) trait ProgressTarget: Send + Sync {
    fn apply(&self, key: &FileKey, update: ProgressUpdate) -> bool;
}

/// Handle a [`ProgressSource`] uses to report progress for one file.
///
/// Reports are clamped below 100, never move progress backwards and are
/// dropped while uploads are paused.
pub struct ProgressSink {
    key: FileKey,
    target: Arc<dyn ProgressTarget>,
}

impl ProgressSink {
    pub(crate) fn new(key: FileKey, target: Arc<dyn ProgressTarget>) -> Self {
        Self { key, target }
    }

    pub fn key(&self) -> &FileKey {
        &self.key
    }

    /// Adds `step` percentage points. Returns `false` when the file has left
    /// the `Uploading` state and the source should stop.
    pub fn advance(&self, step: u8) -> bool {
        self.target.apply(&self.key, ProgressUpdate::Advance(step))
    }

    /// Reports an absolute percentage. Same return value as [`Self::advance`].
    pub fn report(&self, percent: u8) -> bool {
        self.target.apply(&self.key, ProgressUpdate::Report(percent))
    }
}

/// Produces provisional progress for an in-flight file.
///
/// The returned future runs until the sink reports the file is finished or
/// the scheduler drops it when the transfer resolves.
pub trait ProgressSource: Send + Sync {
    fn drive(&self, sink: ProgressSink) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
}

/// Advances progress by a fixed step on a fixed interval.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    interval: Duration,
    step: u8,
}

/// Shortest tick interval; `tokio::time::interval` rejects zero.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

impl SimulatedProgress {
    /// `interval` is raised to at least one millisecond.
    pub fn new(interval: Duration, step: u8) -> Self {
        Self {
            interval: interval.max(MIN_TICK_INTERVAL),
            step,
        }
    }
}

impl ProgressSource for SimulatedProgress {
    fn drive(&self, sink: ProgressSink) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let interval = self.interval;
        let step = self.step;
        Box::pin(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !sink.advance(step) {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records updates and stops accepting after `limit` of them.
    struct RecordingTarget {
        updates: Mutex<Vec<ProgressUpdate>>,
        limit: usize,
    }

    impl ProgressTarget for RecordingTarget {
        fn apply(&self, _key: &FileKey, update: ProgressUpdate) -> bool {
            let mut updates = self.updates.lock().unwrap();
            updates.push(update);
            updates.len() < self.limit
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_ticks_until_sink_closes() {
        let target = Arc::new(RecordingTarget {
            updates: Mutex::new(Vec::new()),
            limit: 4,
        });
        let sink = ProgressSink::new(FileKey::from("a.txt"), target.clone());
        let source = SimulatedProgress::new(Duration::from_millis(500), 10);

        let started = tokio::time::Instant::now();
        source.drive(sink).await;

        let updates = target.updates.lock().unwrap();
        assert_eq!(updates.len(), 4);
        assert!(updates.iter().all(|u| *u == ProgressUpdate::Advance(10)));
        // Four ticks, the first one interval after start.
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_waits_one_interval_before_first_tick() {
        let target = Arc::new(RecordingTarget {
            updates: Mutex::new(Vec::new()),
            limit: usize::MAX,
        });
        let sink = ProgressSink::new(FileKey::from("a.txt"), target.clone());
        let handle = tokio::spawn(SimulatedProgress::new(Duration::from_secs(1), 10).drive(sink));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(target.updates.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(target.updates.lock().unwrap().len(), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let target = Arc::new(RecordingTarget {
            updates: Mutex::new(Vec::new()),
            limit: 3,
        });
        let sink = ProgressSink::new(FileKey::from("a.txt"), target.clone());

        let started = tokio::time::Instant::now();
        SimulatedProgress::new(Duration::ZERO, 10).drive(sink).await;

        assert_eq!(target.updates.lock().unwrap().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(3));
    }

    #[test]
    fn sink_report_passes_absolute_value() {
        let target = Arc::new(RecordingTarget {
            updates: Mutex::new(Vec::new()),
            limit: usize::MAX,
        });
        let sink = ProgressSink::new(FileKey::from("a.txt"), target.clone());
        assert!(sink.report(42));
        assert_eq!(sink.key().as_str(), "a.txt");
        assert_eq!(
            target.updates.lock().unwrap().as_slice(),
            &[ProgressUpdate::Report(42)]
        );
    }
}
