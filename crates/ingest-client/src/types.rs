//! Request and response types for the ingest API.

use serde::{Deserialize, Serialize};

/// `rootDirectory` value sent for files that were not part of a folder drop.
pub const ROOT_DIRECTORY_FALLBACK: &str = "root";

/// One document upload: the file content plus its form metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    /// Sent as `originalFilename` and as the file name of the `documents` part.
    pub original_filename: String,
    /// Sent as `rootDirectory`.
    pub root_directory: String,
    /// Sent as the `documents` part.
    pub data: Vec<u8>,
}

impl UploadForm {
    /// Builds a form for `name`, deriving the root directory from the first
    /// segment of `relative_path`.
    pub fn new(name: &str, relative_path: &str, data: Vec<u8>) -> Self {
        Self {
            original_filename: name.to_string(),
            root_directory: root_directory(relative_path).to_string(),
            data,
        }
    }
}

/// Returns the first `/`-separated segment of `relative_path`, or
/// [`ROOT_DIRECTORY_FALLBACK`] when there is none.
pub fn root_directory(relative_path: &str) -> &str {
    relative_path
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(ROOT_DIRECTORY_FALLBACK)
}

/// Stored document record returned by the ingest endpoint.
///
/// Only `_id` is required. `size` is kept as raw JSON because servers have
/// been seen to send it as a string or omit it; see [`Self::reported_size`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<serde_json::Value>,
    #[serde(
        default,
        rename = "uploadDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_date: Option<String>,
    #[serde(
        default,
        rename = "originalName",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_name: Option<String>,
}

impl IngestResponse {
    /// Server-reported size in bytes, if it is a positive number.
    pub fn reported_size(&self) -> Option<u64> {
        let size = self.size.as_ref()?.as_f64()?;
        if size > 0.0 && size.is_finite() {
            Some(size as u64)
        } else {
            None
        }
    }
}
