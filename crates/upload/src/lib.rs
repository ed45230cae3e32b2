//! Upload orchestration engine.
//!
//! This crate implements the **business logic** for bulk document uploads.
//! It has no UI dependencies: callers feed it [`FileSource`]s, read
//! [`Snapshot`]s for rendering, and listen to [`UploadEvent`]s.
//!
//! # Pipeline
//!
//! 1. **Submit**: files are keyed and merged into the [`FileRecordStore`]
//! 2. **Admit**: the [`UploadScheduler`] moves queued files into a bounded
//!    set of worker slots, in FIFO order
//! 3. **Transfer**: the [`TransferExecutor`] posts the file, retrying
//!    server-side failures
//! 4. **Aggregate**: the [`ProgressAggregator`] derives global progress and
//!    owns the pause flag
//!
//! Pausing freezes progress and admissions only. Transfers already on the
//! wire run to completion and their outcome is applied while paused.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod executor;
pub mod progress;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export primary types for convenience.
pub use aggregator::{GlobalProgress, ProgressAggregator, Summary};
pub use config::UploadConfig;
pub use error::UploadError;
pub use executor::{IngestEndpoint, TransferExecutor};
pub use progress::{ProgressSink, ProgressSource, SimulatedProgress};
pub use scanner::{collect_sources, file_source, scan_folder};
pub use scheduler::{EVENT_CHANNEL_CAPACITY, Snapshot, UploadScheduler};
pub use store::FileRecordStore;
pub use types::{
    FileContent, FileKey, FileRecord, FileSource, FileStatus, RecordPatch, TransferOutcome,
    UploadEvent,
};
