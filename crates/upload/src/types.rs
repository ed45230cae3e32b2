//! Data types for the upload flow.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress value of a successfully uploaded file.
pub const PROGRESS_DONE: u8 = 100;

/// Highest progress a file may show before its transfer has resolved.
pub const MAX_PROVISIONAL_PROGRESS: u8 = 99;

/// Stable identifier of a submitted file.
///
/// Derived from the relative path, or the file name when there is none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Upload status of a file record.
///
/// `Queued → Uploading → {Done, Error}`. The last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    Queued,
    Uploading,
    Done,
    Error,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Error)
    }

    /// Human-readable label for tables.
    pub fn label(self) -> &'static str {
        match self {
            FileStatus::Queued => "Queued",
            FileStatus::Uploading => "Uploading",
            FileStatus::Done => "Complete",
            FileStatus::Error => "Failed",
        }
    }
}

/// Where a file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Bytes already held in memory.
    Memory(Arc<[u8]>),
    /// A file on disk, read on every transfer attempt.
    Disk(PathBuf),
}

impl FileContent {
    /// Loads the full content.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            FileContent::Memory(data) => Ok(data.to_vec()),
            FileContent::Disk(path) => tokio::fs::read(path).await,
        }
    }
}

/// A file handle submitted for upload.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub name: String,
    /// `/`-separated path relative to the dropped folder, including the
    /// folder's own name. Empty for individually picked files.
    pub relative_path: String,
    pub size_bytes: u64,
    pub content: FileContent,
}

impl FileSource {
    /// Creates an in-memory source.
    pub fn from_bytes(name: &str, relative_path: &str, data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            size_bytes: data.len() as u64,
            content: FileContent::Memory(data.into()),
        }
    }

    /// Path shown to the user: the relative path, or the name.
    pub fn display_path(&self) -> &str {
        if self.relative_path.is_empty() {
            &self.name
        } else {
            &self.relative_path
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(self.display_path())
    }

    /// `rootDirectory` value sent alongside the file.
    pub fn root_directory(&self) -> &str {
        docdrop_ingest_client::types::root_directory(&self.relative_path)
    }
}

/// Current upload state of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub key: FileKey,
    pub relative_path: String,
    pub size_bytes: u64,
    pub status: FileStatus,
    /// Percentage in `[0, 100]`.
    pub progress: u8,
    pub remote_id: Option<String>,
    /// Upload date as reported by the server.
    pub uploaded_at: Option<String>,
    /// Cause of the failure when `status` is [`FileStatus::Error`].
    pub error: Option<String>,
    pub attempts: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub(crate) fn new(key: FileKey) -> Self {
        Self {
            relative_path: key.as_str().to_string(),
            key,
            size_bytes: 0,
            status: FileStatus::Queued,
            progress: 0,
            remote_id: None,
            uploaded_at: None,
            error: None,
            attempts: 0,
            completed_at: None,
        }
    }

    pub(crate) fn apply(&mut self, patch: RecordPatch) {
        if let Some(relative_path) = patch.relative_path {
            self.relative_path = relative_path;
        }
        if let Some(size_bytes) = patch.size_bytes {
            self.size_bytes = size_bytes;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.min(PROGRESS_DONE);
        }
        if let Some(remote_id) = patch.remote_id {
            self.remote_id = Some(remote_id);
        }
        if let Some(uploaded_at) = patch.uploaded_at {
            self.uploaded_at = Some(uploaded_at);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(attempts) = patch.attempts {
            self.attempts = attempts;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial update merged into a [`FileRecord`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub relative_path: Option<String>,
    pub size_bytes: Option<u64>,
    pub status: Option<FileStatus>,
    pub progress: Option<u8>,
    pub remote_id: Option<String>,
    pub uploaded_at: Option<String>,
    pub error: Option<String>,
    pub attempts: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// Patch describing a freshly queued file.
    pub fn queued(file: &FileSource) -> Self {
        Self {
            relative_path: Some(file.display_path().to_string()),
            size_bytes: Some(file.size_bytes),
            status: Some(FileStatus::Queued),
            progress: Some(0),
            ..Self::default()
        }
    }

    pub fn status(status: FileStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

/// Terminal result of one file's transfer, retries included.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Done {
        remote_id: String,
        /// Server-reported size, or the local size if the server gave none.
        size_bytes: u64,
        uploaded_at: Option<String>,
        attempts: u32,
    },
    /// Carries no progress value: the record keeps the last progress the
    /// scheduler applied before the failure.
    Failed {
        error: String,
        attempts: u32,
    },
}

impl TransferOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            TransferOutcome::Done { attempts, .. } | TransferOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TransferOutcome::Done { .. })
    }
}

/// Event emitted by the scheduler, in the order transitions happen.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// New records were queued by a submission.
    FilesAdded { count: usize },
    /// A file was admitted to a worker slot.
    Started { key: FileKey },
    /// Provisional progress advanced.
    Progress { key: FileKey, progress: u8 },
    Completed { key: FileKey, remote_id: String },
    Failed { key: FileKey, error: String },
    Paused,
    Resumed,
    /// Nothing is queued or uploading anymore.
    BatchFinished { done: usize, failed: usize },
}

impl UploadEvent {
    /// One-shot status text for assistive technology, if this event has one.
    pub fn announcement(&self) -> Option<String> {
        match self {
            UploadEvent::FilesAdded { count } => Some(format!("{count} file(s) added for upload")),
            UploadEvent::Paused => Some("Uploads paused".into()),
            UploadEvent::Resumed => Some("Uploads resumed".into()),
            UploadEvent::Completed { key, .. } => Some(format!("Upload completed for {key}")),
            UploadEvent::Failed { key, .. } => Some(format!("Upload failed for {key}")),
            UploadEvent::Started { .. }
            | UploadEvent::Progress { .. }
            | UploadEvent::BatchFinished { .. } => None,
        }
    }
}
