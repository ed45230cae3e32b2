//! Ingest endpoint client.
//!
//! Async HTTP client using `reqwest` multipart forms.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::types::{IngestResponse, UploadForm};

/// Endpoint used when no configuration overrides it.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/documents";

/// Lower-cased message fragments that mark a failure as a transient server
/// condition.
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "temporarily",
    "unavailable",
    "server error",
    "connection reset",
    "try again",
];

/// Errors from the ingest client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request never reached the server.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether a fresh attempt of the same request may succeed.
    ///
    /// Server-side statuses (5xx) and transport failures are retryable.
    /// Client-side statuses (4xx) and undecodable responses are not. Other
    /// failures are retryable when their message names a transient server
    /// condition.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status, body } => match *status {
                500..=599 => true,
                400..=499 => false,
                _ => signals_transient(body),
            },
            Error::Http(e) => match e.status() {
                Some(status) if status.is_server_error() => true,
                Some(status) if status.is_client_error() => false,
                _ if e.is_decode() || e.is_builder() => false,
                _ if e.is_timeout() || e.is_request() || e.is_body() => true,
                _ => signals_transient(&error_chain(e)),
            },
            Error::Transport(_) => true,
            Error::Json(_) | Error::Malformed(_) => false,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn signals_transient(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
}

/// `err` and its sources joined with `": "`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Ingest API client.
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
}

impl Client {
    /// Creates a client posting to `endpoint`.
    ///
    /// Without a `timeout` a hung request is only bounded by the OS.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint: endpoint.to_string(),
        })
    }

    /// The URL documents are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Uploads one document and returns the stored record.
    pub async fn upload(&self, form: UploadForm) -> Result<IngestResponse, Error> {
        let size = form.data.len();
        let part = Part::bytes(form.data).file_name(form.original_filename.clone());
        let multipart = Form::new()
            .part("documents", part)
            .text("originalFilename", form.original_filename)
            .text("rootDirectory", form.root_directory);

        let resp = self
            .http
            .post(&self.endpoint)
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Transport(error_chain(&e))
                } else {
                    Error::Http(e)
                }
            })?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        debug!(bytes = size, status = status.as_u16(), "document accepted");
        parse_response(&body)
    }
}

/// Decodes a success body into an [`IngestResponse`].
pub fn parse_response(body: &[u8]) -> Result<IngestResponse, Error> {
    let resp: IngestResponse = serde_json::from_slice(body)?;
    if resp.id.trim().is_empty() {
        return Err(Error::Malformed("response has an empty _id".into()));
    }
    Ok(resp)
}
