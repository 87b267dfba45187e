//! Error types for the dua-overlay library.
//!
//! Every failure in an upload session is terminal for that session: there is
//! no partial-success state. [`AnalysisError`] therefore covers the whole
//! pipeline (input, submission, polling, reconciliation, rendering) and the
//! caller resets the session to idle before retrying a fresh submission.
//!
//! Each variant maps to a stable machine-readable [`AnalysisError::kind`]
//! code. [`ErrorDescriptor`] pairs that code with the human message and is
//! the single error shape surfaced at the caller-facing boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the dua-overlay library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input string is not a file path or a valid URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The bytes read are not a PDF.
    #[error("Input is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    // ── Service errors ────────────────────────────────────────────────────
    /// The submit call failed: validation, network failure, non-2xx
    /// response, or a 2xx response without an operation handle.
    #[error("Submission failed: {reason}")]
    Submission { reason: String },

    /// A status poll failed at the transport level.
    ///
    /// `transient` is true for network blips, timeouts and 5xx/429
    /// responses; only those are retried by the poller.
    #[error("Status request failed: {reason}")]
    Transport { reason: String, transient: bool },

    /// The service reported a terminal failure for the job.
    #[error("Analysis failed{}: {message}", code_suffix(.code))]
    AnalysisFailed {
        code: Option<String>,
        message: String,
    },

    /// The polling ceiling was reached without a terminal status.
    #[error("Analysis did not complete after {attempts} polls ({elapsed_ms}ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },

    // ── Result / geometry errors ──────────────────────────────────────────
    /// The source page has a non-positive or non-finite width or height.
    #[error("Invalid page dimensions {width}x{height}")]
    InvalidPageDimensions { width: f64, height: f64 },

    /// The analysis result lacks the expected `pages`/`documents` shape.
    #[error("Malformed analysis result: {0}")]
    MalformedResult(String),

    // ── Session errors ────────────────────────────────────────────────────
    /// An upload is already in flight on this session.
    #[error("An analysis is already running for this session")]
    SessionBusy,

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// pdfium could not open or rasterise the page.
    #[error("Rendering page {page} failed: {detail}")]
    Render { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

impl AnalysisError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            Self::NotAPdf { .. } => "NOT_A_PDF",
            Self::Submission { .. } => "SUBMISSION_ERROR",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::AnalysisFailed { .. } => "ANALYSIS_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidPageDimensions { .. } => "INVALID_PAGE_DIMENSIONS",
            Self::MalformedResult(_) => "MALFORMED_RESULT",
            Self::SessionBusy => "SESSION_BUSY",
            Self::PdfiumBindingFailed(_) => "PDFIUM_BINDING_FAILED",
            Self::Render { .. } => "RENDER_ERROR",
            Self::OutputWriteFailed { .. } => "OUTPUT_WRITE_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the poller may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { transient: true, .. })
    }

    /// Collapse into the caller-facing `{ kind, message }` descriptor.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Single error descriptor returned across the caller-facing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
}

impl From<&AnalysisError> for ErrorDescriptor {
    fn from(e: &AnalysisError) -> Self {
        e.descriptor()
    }
}
