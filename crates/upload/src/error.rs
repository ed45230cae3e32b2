//! Upload error types.

/// Errors produced while preparing or transferring uploads.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ingest error: {0}")]
    Ingest(#[from] docdrop_ingest_client::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl UploadError {
    /// Whether the transfer executor should re-attempt after this error.
    ///
    /// Local I/O failures (unreadable content) are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Ingest(e) => e.is_retryable(),
            UploadError::Io(_) | UploadError::InvalidConfig(_) => false,
        }
    }
}
