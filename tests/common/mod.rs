//! Shared fixtures for the integration tests: a scripted analysis backend
//! and canned service payloads.

#![allow(dead_code)]

use async_trait::async_trait;
use dua_overlay::model::StatusResponse;
use dua_overlay::{AnalysisBackend, AnalysisError, AnalysisResult, AnalysisStatus, PollProgressCallback};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";
pub const HANDLE: &str =
    "https://dua.test/formrecognizer/documentModels/EuropeanExportDUAModel/analyzeResults/op-1";

/// Backend that replays a fixed sequence of status responses.
///
/// Once the script is exhausted every further poll reports `running`.
pub struct ScriptedBackend {
    handle: Option<String>,
    script: Mutex<VecDeque<Result<StatusResponse, AnalysisError>>>,
    submits: AtomicUsize,
    polls: AtomicUsize,
    poll_times: Mutex<Vec<Instant>>,
    status_delay: Duration,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<StatusResponse, AnalysisError>>) -> Self {
        Self {
            handle: Some(HANDLE.to_string()),
            script: Mutex::new(script.into()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            status_delay: Duration::ZERO,
        }
    }

    /// A service that accepts the upload but sends no operation handle.
    pub fn without_handle() -> Self {
        Self {
            handle: None,
            ..Self::new(Vec::new())
        }
    }

    /// Every status call takes `delay` before it answers.
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn submit(&self, _document: &[u8]) -> Result<String, AnalysisError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.handle.clone().ok_or_else(|| AnalysisError::Submission {
            reason: "response is missing the operation-location header".into(),
        })
    }

    async fn status(&self, operation_handle: &str) -> Result<StatusResponse, AnalysisError> {
        assert_eq!(operation_handle, HANDLE);
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.poll_times.lock().unwrap().push(Instant::now());
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(running()))
    }
}

pub fn running() -> StatusResponse {
    StatusResponse {
        status: AnalysisStatus::Running,
        analyze_result: None,
        error: None,
    }
}

pub fn succeeded(result: AnalysisResult) -> StatusResponse {
    StatusResponse {
        status: AnalysisStatus::Succeeded,
        analyze_result: Some(result),
        error: None,
    }
}

pub fn failed(code: &str, message: &str) -> StatusResponse {
    serde_json::from_value(json!({
        "status": "failed",
        "error": { "code": code, "message": message }
    }))
    .unwrap()
}

pub fn transient() -> AnalysisError {
    AnalysisError::Transport {
        reason: "connection reset by peer".into(),
        transient: true,
    }
}

/// A 1000×1500 page with one single-region field and one two-region field.
pub fn dua_result() -> AnalysisResult {
    serde_json::from_value(json!({
        "apiVersion": "2023-07-31",
        "modelId": "EuropeanExportDUAModel",
        "pages": [{ "pageNumber": 1, "width": 1000.0, "height": 1500.0, "unit": "pixel" }],
        "documents": [{
            "docType": "EuropeanExportDUAModel",
            "fields": {
                "Exporter": {
                    "valueString": "ACME S.L.",
                    "confidence": 0.98,
                    "boundingRegions": [{
                        "pageNumber": 1,
                        "polygon": [100, 100, 900, 100, 900, 300, 100, 300]
                    }]
                },
                "Goods": {
                    "boundingRegions": [
                        { "pageNumber": 1, "polygon": [100, 500, 500, 500, 500, 600, 100, 600] },
                        { "pageNumber": 1, "polygon": [100, 700, 500, 700, 500, 800, 100, 800] }
                    ]
                },
                "Signature": {
                    "boundingRegions": [{
                        "pageNumber": 2,
                        "polygon": [0, 0, 10, 0, 10, 10, 0, 10]
                    }]
                }
            }
        }]
    }))
    .unwrap()
}

/// Records every poll event it receives.
#[derive(Default)]
pub struct CountingCallback {
    pub submitted: AtomicUsize,
    pub polls: AtomicU32,
    pub retries: AtomicU32,
    pub completed: Mutex<Option<(u32, bool)>>,
}

impl PollProgressCallback for CountingCallback {
    fn on_submitted(&self, _operation_handle: &str) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    fn on_poll(&self, _attempt: u32, _status: AnalysisStatus) {
        self.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn on_transport_retry(&self, _attempt: u32, _retry: u32, _error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, attempts: u32, succeeded: bool) {
        *self.completed.lock().unwrap() = Some((attempts, succeeded));
    }
}
