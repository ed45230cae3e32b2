//! Single-file transfer with retry.
//!
//! [`IngestEndpoint`] abstracts the network collaborator so the retry policy
//! can be tested with scripted responses. The executor absorbs retries and
//! reports only the final [`TransferOutcome`]; it never touches scheduling
//! state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use docdrop_ingest_client::{Client, Error as IngestError, IngestResponse, UploadForm};
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::{FileSource, TransferOutcome};

/// Abstract connection to the ingest endpoint.
///
/// [`Client`] implements this for real HTTP; tests use scripted mocks.
pub trait IngestEndpoint: Send + Sync {
    /// Sends one document and waits for the stored record.
    fn send_document(
        &self,
        form: UploadForm,
    ) -> Pin<Box<dyn Future<Output = Result<IngestResponse, IngestError>> + Send + '_>>;
}

impl IngestEndpoint for Client {
    fn send_document(
        &self,
        form: UploadForm,
    ) -> Pin<Box<dyn Future<Output = Result<IngestResponse, IngestError>> + Send + '_>> {
        Box::pin(self.upload(form))
    }
}

/// Performs one file's transfer, re-attempting retryable failures.
#[derive(Clone)]
pub struct TransferExecutor {
    endpoint: Arc<dyn IngestEndpoint>,
    max_retries: u32,
}

impl TransferExecutor {
    /// `max_retries` re-attempts follow the first one, so at most
    /// `max_retries + 1` requests are made per file.
    pub fn new(endpoint: Arc<dyn IngestEndpoint>, max_retries: u32) -> Self {
        Self {
            endpoint,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Uploads `file` and returns the terminal outcome.
    ///
    /// Each retry is a full re-attempt (content re-read, request re-sent)
    /// with no delay in between.
    pub async fn transfer(&self, file: &FileSource) -> TransferOutcome {
        let key = file.key();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.attempt(file).await {
                Ok(resp) => {
                    let size_bytes = resp.reported_size().unwrap_or(file.size_bytes);
                    debug!(
                        file = %key,
                        attempts,
                        remote_id = %resp.id,
                        size_bytes,
                        "transfer succeeded"
                    );
                    return TransferOutcome::Done {
                        remote_id: resp.id,
                        size_bytes,
                        uploaded_at: resp.upload_date,
                        attempts,
                    };
                }
                Err(e) => {
                    let retries_used = attempts - 1;
                    if e.is_retryable() && retries_used < self.max_retries {
                        warn!(file = %key, attempt = attempts, error = %e, "retrying upload");
                        continue;
                    }
                    debug!(
                        file = %key,
                        attempts,
                        retryable = e.is_retryable(),
                        error = %e,
                        "transfer failed"
                    );
                    return TransferOutcome::Failed {
                        error: failure_description(&e),
                        attempts,
                    };
                }
            }
        }
    }

    async fn attempt(&self, file: &FileSource) -> Result<IngestResponse, UploadError> {
        let data = file.content.read().await?;
        let form = UploadForm::new(&file.name, &file.relative_path, data);
        Ok(self.endpoint.send_document(form).await?)
    }
}

/// Human-readable cause kept on the failed record.
fn failure_description(err: &UploadError) -> String {
    match err {
        UploadError::Ingest(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock endpoint that replays scripted results and records requests.
    struct ScriptedEndpoint {
        responses: Mutex<VecDeque<Result<IngestResponse, IngestError>>>,
        requests: Mutex<Vec<UploadForm>>,
    }

    impl ScriptedEndpoint {
        fn new(responses: Vec<Result<IngestResponse, IngestError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl IngestEndpoint for ScriptedEndpoint {
        fn send_document(
            &self,
            form: UploadForm,
        ) -> Pin<Box<dyn Future<Output = Result<IngestResponse, IngestError>> + Send + '_>>
        {
            self.requests.lock().unwrap().push(form);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(IngestError::Malformed("no scripted response".into())));
            Box::pin(async move { next })
        }
    }

    fn ok(id: &str, size: Option<serde_json::Value>) -> Result<IngestResponse, IngestError> {
        Ok(IngestResponse {
            id: id.into(),
            size,
            upload_date: Some("2024-03-01T10:00:00.000Z".into()),
            original_name: None,
        })
    }

    fn status(code: u16) -> Result<IngestResponse, IngestError> {
        Err(IngestError::Api {
            status: code,
            body: format!("status {code}"),
        })
    }

    fn sample_file() -> FileSource {
        FileSource::from_bytes("q1.pdf", "reports/q1.pdf", b"PDF-DATA".to_vec())
    }

    #[tokio::test]
    async fn succeeds_after_two_server_errors() {
        let endpoint = ScriptedEndpoint::new(vec![status(503), status(503), ok("doc-1", None)]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 3);
        assert_eq!(
            outcome,
            TransferOutcome::Done {
                remote_id: "doc-1".into(),
                size_bytes: 8,
                uploaded_at: Some("2024-03-01T10:00:00.000Z".into()),
                attempts: 3,
            }
        );
    }

    #[tokio::test]
    async fn client_error_fails_without_retry() {
        let endpoint = ScriptedEndpoint::new(vec![status(404), ok("never", None)]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 1);
        match outcome {
            TransferOutcome::Failed { error, attempts } => {
                assert_eq!(attempts, 1);
                assert!(error.contains("404"), "error should mention 404: {error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_report_last_error() {
        let endpoint = ScriptedEndpoint::new(vec![status(500), status(502), status(503)]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 3);
        match outcome {
            TransferOutcome::Failed { error, attempts } => {
                assert_eq!(attempts, 3);
                assert!(error.contains("503"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failures_are_retried() {
        let endpoint = ScriptedEndpoint::new(vec![
            Err(IngestError::Transport("connection refused".into())),
            ok("doc-2", None),
        ]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 2);
        assert!(outcome.is_done());
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let endpoint = ScriptedEndpoint::new(vec![
            Err(IngestError::Malformed("response has an empty _id".into())),
            ok("doc-3", None),
        ]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 1);
        assert!(!outcome.is_done());
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let endpoint = ScriptedEndpoint::new(vec![status(503), ok("doc-4", None)]);
        let executor = TransferExecutor::new(endpoint.clone(), 0);

        let outcome = executor.transfer(&sample_file()).await;

        assert_eq!(endpoint.request_count(), 1);
        assert_eq!(outcome.attempts(), 1);
        assert!(!outcome.is_done());
    }

    #[tokio::test]
    async fn server_size_overrides_local_size() {
        let endpoint = ScriptedEndpoint::new(vec![ok("doc-5", Some(serde_json::json!(4096)))]);
        let executor = TransferExecutor::new(endpoint, 2);

        match executor.transfer(&sample_file()).await {
            TransferOutcome::Done { size_bytes, .. } => assert_eq!(size_bytes, 4096),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_positive_server_size_falls_back_to_local() {
        let endpoint = ScriptedEndpoint::new(vec![ok("doc-6", Some(serde_json::json!(0)))]);
        let executor = TransferExecutor::new(endpoint, 2);

        match executor.transfer(&sample_file()).await {
            TransferOutcome::Done { size_bytes, .. } => assert_eq!(size_bytes, 8),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_name_and_root_directory() {
        let endpoint = ScriptedEndpoint::new(vec![ok("doc-7", None)]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);

        executor.transfer(&sample_file()).await;

        let requests = endpoint.requests.lock().unwrap();
        assert_eq!(requests[0].original_filename, "q1.pdf");
        assert_eq!(requests[0].root_directory, "reports");
        assert_eq!(requests[0].data, b"PDF-DATA");
    }

    #[tokio::test]
    async fn unreadable_content_fails_without_request() {
        let endpoint = ScriptedEndpoint::new(vec![ok("doc-8", None)]);
        let executor = TransferExecutor::new(endpoint.clone(), 2);
        let file = FileSource {
            name: "gone.txt".into(),
            relative_path: String::new(),
            size_bytes: 10,
            content: crate::types::FileContent::Disk("/nonexistent/docdrop/gone.txt".into()),
        };

        let outcome = executor.transfer(&file).await;

        assert_eq!(endpoint.request_count(), 0);
        assert_eq!(outcome.attempts(), 1);
        assert!(!outcome.is_done());
    }
}
