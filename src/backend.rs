//! The analysis service seam.
//!
//! [`AnalysisBackend`] is the whole contract the poller relies on: one
//! submit call that yields an opaque operation handle, and a read-only,
//! repeatable status call against that handle. [`HttpBackend`] speaks the
//! cloud service's REST dialect over reqwest; tests substitute a scripted
//! implementation.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::model::StatusResponse;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the subscription key on every call.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
/// Response header holding the status URL of a submitted job.
pub const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Submit/status protocol of an asynchronous analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Upload a document and return the operation handle of the new job.
    ///
    /// Errors are reported as [`AnalysisError::Submission`].
    async fn submit(&self, document: &[u8]) -> Result<String, AnalysisError>;

    /// Read the current status of a job. Side-effect free.
    ///
    /// Errors are reported as [`AnalysisError::Transport`] or
    /// [`AnalysisError::MalformedResult`].
    async fn status(&self, operation_handle: &str) -> Result<StatusResponse, AnalysisError>;
}

/// reqwest-backed client for the document-analysis REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    api_version: String,
}

impl HttpBackend {
    /// Build a client from the service fields of `config`.
    ///
    /// Fails with [`AnalysisError::InvalidConfig`] when no API key is set.
    pub fn new(config: &AnalyzerConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AnalysisError::InvalidConfig(
                    "No API key configured.\nSet DUA_API_KEY or pass --api-key.".into(),
                )
            })?;
        if config.endpoint.is_empty() {
            return Err(AnalysisError::InvalidConfig("endpoint is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            model_id: config.model_id.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// URL of the analyze call for the configured model.
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }

    /// URL of the model build (retrain) call.
    pub fn build_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels:build?api-version={}",
            self.endpoint, self.api_version
        )
    }

    /// Ask the service to rebuild the model from labelled training data.
    ///
    /// `source` is the training-data container the service reads from;
    /// `corrected_data` carries the user's field corrections. The service
    /// response is returned verbatim.
    pub async fn retrain(&self, source: &str, corrected_data: Value) -> Result<Value, AnalysisError> {
        info!("Requesting model build from {}", source);
        let payload = serde_json::json!({
            "source": source,
            "useLabelFile": true,
            "correctedData": corrected_data,
        });

        let response = self
            .http
            .post(self.build_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AnalysisError::Submission {
                reason: format!("model build request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Submission {
                reason: format!("model build returned HTTP {status}: {body}"),
            });
        }

        // 202 Accepted carries no body; report the operation handle instead.
        let location = operation_location(response.headers());
        let text = response.text().await.map_err(|e| AnalysisError::Submission {
            reason: format!("model build response unreadable: {e}"),
        })?;
        if text.trim().is_empty() {
            return Ok(serde_json::json!({ "operationLocation": location }));
        }
        serde_json::from_str(&text).map_err(|e| AnalysisError::Submission {
            reason: format!("model build response is not JSON: {e}"),
        })
    }
}

fn operation_location(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get(OPERATION_LOCATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 5xx, 408 and 429 are worth retrying; other statuses are not.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn submit(&self, document: &[u8]) -> Result<String, AnalysisError> {
        let url = self.analyze_url();
        debug!("POST {} ({} bytes)", url, document.len());

        let response = self
            .http
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document.to_vec())
            .send()
            .await
            .map_err(|e| AnalysisError::Submission {
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Submission {
                reason: format!("HTTP {status}: {body}"),
            });
        }

        operation_location(response.headers()).ok_or_else(|| AnalysisError::Submission {
            reason: "response carried no operation-location header".into(),
        })
    }

    async fn status(&self, operation_handle: &str) -> Result<StatusResponse, AnalysisError> {
        let response = self
            .http
            .get(operation_handle)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport {
                reason: e.to_string(),
                transient: e.is_timeout() || e.is_connect() || e.is_request(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Transport {
                reason: format!("HTTP {status}: {body}"),
                transient: is_transient_status(status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AnalysisError::Transport {
            reason: format!("reading body: {e}"),
            transient: true,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AnalysisError::MalformedResult(format!("status body: {e}")))
    }
}
