//! # dua-overlay
//!
//! Submit customs declaration PDFs (DUA) to a cloud document-analysis
//! service, wait for the long-running analysis to finish, and map every
//! extracted field's polygon onto a page overlay.
//!
//! ## Why this crate?
//!
//! The analysis service answers a submission with an operation handle, not a
//! result. Someone has to poll that handle with sane ceilings, tell a
//! transient network blip from a failed job, and then translate field
//! polygons from page units (inches) into whatever pixel surface the page is
//! displayed on. This crate does those two jobs and keeps the identity of
//! every drawn box so a caller can highlight a field later.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, check %PDF
//!  ├─ 2. Submit     POST bytes, read the operation handle
//!  ├─ 3. Poll       sleep → status → … until succeeded / failed / timeout
//!  ├─ 4. Reconcile  polygons (page units) → rectangles (surface pixels)
//!  └─ 5. Overlay    draw shapes, keep FieldId → shape table for highlights
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dua_overlay::{analyze, AnalyzeOptions, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Endpoint, key and model from DUA_ENDPOINT / DUA_API_KEY / DUA_MODEL_ID
//!     let config = AnalyzerConfig::from_env();
//!     let output = analyze("dua.pdf", &config, &AnalyzeOptions::default()).await?;
//!     for shape in &output.shapes {
//!         println!("{} @ ({:.0}, {:.0})", shape.field_id, shape.left, shape.top);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Progress
//!
//! ```rust,no_run
//! use dua_overlay::{AnalysisStatus, AnalyzerConfig, PollProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//! impl PollProgressCallback for Log {
//!     fn on_poll(&self, attempt: u32, status: AnalysisStatus) {
//!         eprintln!("poll #{attempt}: {status:?}");
//!     }
//! }
//!
//! let config = AnalyzerConfig::builder()
//!     .api_key("…")
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dua-overlay` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! dua-overlay = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod session;
pub mod svg;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{
    analyze, analyze_bytes, analyze_sync, analyze_to_svg, analyze_to_svg_with_backend,
    analyze_with_backend, retrain, AnalysisOutput, AnalysisStats, AnalyzeOptions,
};
pub use backend::{AnalysisBackend, HttpBackend};
pub use color::{Color, ColorAssigner, FixedColorAssigner, PaletteColorAssigner};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, HighlightStyle, PollPolicy};
pub use error::{AnalysisError, ErrorDescriptor};
pub use geometry::{build_shapes, compute_scale, reconcile, FieldId, FieldShape, ScaleFactors};
pub use model::{AnalysisJob, AnalysisResult, AnalysisStatus, Document, Field, Page, Region};
pub use overlay::{highlight, OverlayRenderer, OverlayState, ShapeHandle, ShapeTable};
pub use pipeline::render::PageViewport;
pub use poller::{await_completion, submit};
pub use progress::{NoopProgressCallback, PollProgressCallback, ProgressCallback};
pub use session::{AnalysisSession, SessionState};
pub use svg::SvgScene;
