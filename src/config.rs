//! Configuration types for document analysis and overlay rendering.
//!
//! All behaviour is controlled through [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`] or loaded from the environment with
//! [`AnalyzerConfig::from_env`]. The polling knobs are projected into a
//! [`PollPolicy`] so the poller never sees service credentials.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default analysis endpoint host.
pub const DEFAULT_ENDPOINT: &str = "https://dua-ocr.cognitiveservices.azure.com";
/// Custom model trained on European export DUA forms.
pub const DEFAULT_MODEL_ID: &str = "EuropeanExportDUAModel";
pub const DEFAULT_API_VERSION: &str = "2023-07-31";

/// Configuration for one analyser.
///
/// # Example
/// ```rust
/// use dua_overlay::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .api_key("secret")
///     .poll_interval_ms(1000)
///     .max_attempts(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_policy().max_attempts, Some(60));
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Service base URL, without a trailing slash. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    pub api_key: Option<String>,

    /// Model identifier placed in the analyze path. Default: [`DEFAULT_MODEL_ID`].
    pub model_id: String,

    /// `api-version` query parameter. Default: [`DEFAULT_API_VERSION`].
    pub api_version: String,

    /// Wait before every status poll, including the first. Default: 2000.
    pub poll_interval_ms: u64,

    /// Maximum number of status polls. Default: 150.
    pub max_attempts: Option<u32>,

    /// Wall-clock ceiling for polling, in seconds. Default: 300.
    pub max_duration_secs: Option<u64>,

    /// Per-HTTP-call timeout in seconds. Default: 30.
    ///
    /// Independent of the polling ceiling: a single hung request fails
    /// after this long and is retried like any other transport blip.
    pub request_timeout_secs: u64,

    /// Retries of a single status poll on a transient transport error. Default: 3.
    pub max_transport_retries: u32,

    /// Initial retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// 0-based page the overlay is built for. Default: 0.
    pub page_index: usize,

    /// Stroke widths and duration used by highlight.
    pub highlight: HighlightStyle,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for submit/poll events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval_ms: 2000,
            max_attempts: Some(150),
            max_duration_secs: Some(300),
            request_timeout_secs: 30,
            max_transport_retries: 3,
            retry_backoff_ms: 500,
            page_index: 0,
            highlight: HighlightStyle::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_attempts", &self.max_attempts)
            .field("max_duration_secs", &self.max_duration_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_transport_retries", &self.max_transport_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("page_index", &self.page_index)
            .field("highlight", &self.highlight)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PollProgressCallback>"),
            )
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with `DUA_ENDPOINT`, `DUA_API_KEY`, `DUA_MODEL_ID`
    /// and `DUA_API_VERSION` when set and non-empty.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(v) = var("DUA_ENDPOINT") {
            config.endpoint = v.trim_end_matches('/').to_string();
        }
        config.api_key = var("DUA_API_KEY");
        if let Some(v) = var("DUA_MODEL_ID") {
            config.model_id = v;
        }
        if let Some(v) = var("DUA_API_VERSION") {
            config.api_version = v;
        }
        config
    }

    /// Polling knobs as a [`PollPolicy`].
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
            max_duration: self.max_duration_secs.map(Duration::from_secs),
            max_transport_retries: self.max_transport_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = Some(n);
        self
    }

    pub fn max_duration_secs(mut self, secs: u64) -> Self {
        self.config.max_duration_secs = Some(secs);
        self
    }

    /// Remove both polling ceilings. Polling then only ends on a terminal status.
    pub fn unbounded_polling(mut self) -> Self {
        self.config.max_attempts = None;
        self.config.max_duration_secs = None;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_transport_retries(mut self, n: u32) -> Self {
        self.config.max_transport_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn page_index(mut self, index: usize) -> Self {
        self.config.page_index = index;
        self
    }

    pub fn highlight(mut self, style: HighlightStyle) -> Self {
        self.config.highlight = style;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalysisError> {
        let c = &self.config;
        if c.poll_interval_ms == 0 {
            return Err(AnalysisError::InvalidConfig(
                "Poll interval must be > 0ms".into(),
            ));
        }
        if c.max_attempts == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.max_duration_secs == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "max_duration_secs must be ≥ 1".into(),
            ));
        }
        if let Some(secs) = c.max_duration_secs {
            if secs.saturating_mul(1000) < c.poll_interval_ms {
                return Err(AnalysisError::InvalidConfig(format!(
                    "max_duration_secs ({secs}s) is shorter than the poll interval ({}ms)",
                    c.poll_interval_ms
                )));
            }
        }
        if c.model_id.is_empty() {
            return Err(AnalysisError::InvalidConfig("model_id is empty".into()));
        }
        c.highlight.validate()?;
        Ok(self.config)
    }
}

/// Bounded polling policy for [`crate::poller::await_completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub poll_interval: Duration,
    /// `None` disables the attempt ceiling.
    pub max_attempts: Option<u32>,
    /// `None` disables the wall-clock ceiling.
    pub max_duration: Option<Duration>,
    pub max_transport_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        AnalyzerConfig::default().poll_policy()
    }
}

impl PollPolicy {
    pub fn with_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }

    /// Backoff before transport retry `n` (1-based): `retry_backoff * 2^(n-1)`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor)
    }
}

/// Stroke widths applied by a highlight, and how long the emphasis lasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub transient_stroke_width: f64,
    pub normal_stroke_width: f64,
    pub duration_ms: u64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            transient_stroke_width: 4.0,
            normal_stroke_width: 2.0,
            duration_ms: 1000,
        }
    }
}

impl HighlightStyle {
    fn validate(&self) -> Result<(), AnalysisError> {
        let ok = |w: f64| w.is_finite() && w >= 0.0;
        if !ok(self.transient_stroke_width) || !ok(self.normal_stroke_width) {
            return Err(AnalysisError::InvalidConfig(format!(
                "stroke widths must be finite and ≥ 0, got {} / {}",
                self.transient_stroke_width, self.normal_stroke_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.model_id, "EuropeanExportDUAModel");
        assert_eq!(c.api_version, "2023-07-31");
        assert_eq!(c.poll_interval_ms, 2000);
        assert_eq!(c.page_index, 0);
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let err = AnalyzerConfig::builder().poll_interval_ms(0).build().unwrap_err();
        assert_eq!(err.kind(), "INVALID_CONFIG");
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        assert!(AnalyzerConfig::builder().max_attempts(0).build().is_err());
    }

    #[test]
    fn builder_rejects_duration_shorter_than_interval() {
        let err = AnalyzerConfig::builder()
            .poll_interval_ms(5000)
            .max_duration_secs(4)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_CONFIG");

        assert!(AnalyzerConfig::builder()
            .poll_interval_ms(5000)
            .max_duration_secs(5)
            .build()
            .is_ok());
    }

    #[test]
    fn builder_trims_endpoint_slash() {
        let c = AnalyzerConfig::builder()
            .endpoint("https://example.test/")
            .build()
            .unwrap();
        assert_eq!(c.endpoint, "https://example.test");
    }

    #[test]
    fn unbounded_polling_clears_ceilings() {
        let p = AnalyzerConfig::builder()
            .unbounded_polling()
            .build()
            .unwrap()
            .poll_policy();
        assert_eq!(p.max_attempts, None);
        assert_eq!(p.max_duration, None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = AnalyzerConfig::builder().api_key("super-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn backoff_doubles() {
        let p = PollPolicy {
            retry_backoff: Duration::from_millis(500),
            ..PollPolicy::default()
        };
        assert_eq!(p.backoff_for(1), Duration::from_millis(500));
        assert_eq!(p.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(p.backoff_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn negative_stroke_rejected() {
        let style = HighlightStyle {
            transient_stroke_width: -1.0,
            ..HighlightStyle::default()
        };
        assert!(AnalyzerConfig::builder().highlight(style).build().is_err());
    }
}
