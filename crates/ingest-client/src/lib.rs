//! Document ingest API client.
//!
//! Sends one document per request to the ingest endpoint as a multipart
//! form and decodes the JSON record the server returns. Errors carry enough
//! information for callers to decide whether a retry makes sense.

pub mod client;
pub mod types;

pub use client::{Client, DEFAULT_ENDPOINT, Error};
pub use types::{IngestResponse, ROOT_DIRECTORY_FALLBACK, UploadForm};
