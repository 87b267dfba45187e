//! One-shot entry points: resolve a PDF, analyse it, reconcile its fields.
//!
//! These wrap [`crate::poller`], [`crate::geometry`] and the pipeline stages
//! for callers that want a finished result instead of driving an
//! [`AnalysisSession`] themselves. Interactive callers that keep an overlay
//! alive between uploads should use the session directly.

use crate::backend::{AnalysisBackend, HttpBackend};
use crate::color::{ColorAssigner, PaletteColorAssigner};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::geometry::{reconcile, FieldId, FieldShape};
use crate::model::{AnalysisJob, AnalysisResult};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{self, PageViewport};
use crate::pipeline::encode;
use crate::poller;
use crate::session::AnalysisSession;
use crate::svg::SvgScene;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Per-call knobs that are not part of the service configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Target surface size. Defaults to the page's natural size in points.
    pub viewport: Option<PageViewport>,
    /// Seed for field colours; unseeded colours differ between runs.
    pub color_seed: Option<u64>,
    /// Embed the rasterised page under the SVG shapes.
    pub background: bool,
    /// Field to emphasise in the written SVG.
    pub highlight: Option<FieldId>,
}

/// Timing and counts for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub field_count: usize,
    pub shape_count: usize,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub operation_handle: String,
    pub viewport: PageViewport,
    pub shapes: Vec<FieldShape>,
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}

/// Submit `document` and wait for the terminal result.
pub async fn analyze_bytes(
    backend: &dyn AnalysisBackend,
    document: &[u8],
    config: &AnalyzerConfig,
) -> Result<(AnalysisJob, AnalysisResult), AnalysisError> {
    let job = poller::submit(backend, document).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_submitted(&job.operation_handle);
    }
    let result = poller::await_completion(
        backend,
        &job,
        &config.poll_policy(),
        config.progress_callback.as_ref(),
    )
    .await?;
    Ok((job, result))
}

/// Analyse a PDF file or URL against the configured service.
///
/// # Errors
/// Input errors (`FileNotFound`, `NotAPdf`, …) are returned before anything
/// is uploaded. After that any poller or reconciler error is returned as-is.
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<AnalysisOutput, AnalysisError> {
    let backend = HttpBackend::new(config)?;
    analyze_with_backend(&backend, input_str, config, options).await
}

/// [`analyze`] with a caller-supplied backend.
pub async fn analyze_with_backend(
    backend: &dyn AnalysisBackend,
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<AnalysisOutput, AnalysisError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;

    // The page size comes from the local file, the fields from the service.
    let analysis_start = Instant::now();
    let (viewport, (job, result)) = futures::try_join!(
        viewport_for(&resolved, config, options),
        analyze_bytes(backend, resolved.bytes(), config),
    )?;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    let mut colors = color_assigner(options);
    let shapes = reconcile(
        &result,
        config.page_index,
        viewport.width,
        viewport.height,
        colors.as_mut(),
    )?;

    let stats = AnalysisStats {
        field_count: result.documents.first().map_or(0, |d| d.fields.len()),
        shape_count: shapes.len(),
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Analysis complete: {} fields, {} shapes, {}ms total",
        stats.field_count, stats.shape_count, stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        operation_handle: job.operation_handle,
        viewport,
        shapes,
        result,
        stats,
    })
}

/// Analyse a PDF and write its field overlay as an SVG file.
///
/// The overlay goes through an [`AnalysisSession`], so a requested highlight
/// is applied exactly as an interactive caller would see it.
pub async fn analyze_to_svg(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<AnalysisStats, AnalysisError> {
    let backend: Arc<dyn AnalysisBackend> = Arc::new(HttpBackend::new(config)?);
    analyze_to_svg_with_backend(backend, input_str, output_path, config, options).await
}

/// [`analyze_to_svg`] with a caller-supplied backend.
pub async fn analyze_to_svg_with_backend(
    backend: Arc<dyn AnalysisBackend>,
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<AnalysisStats, AnalysisError> {
    let total_start = Instant::now();
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let viewport = viewport_for(&resolved, config, options).await?;

    let mut scene = SvgScene::new(
        viewport.width,
        viewport.height,
        config.highlight.normal_stroke_width,
    );
    if options.background {
        let image = render::render_page(resolved.path(), config.page_index, viewport).await?;
        let data_uri = encode::encode_page(&image).map_err(|e| AnalysisError::Render {
            page: config.page_index + 1,
            detail: format!("Image encoding failed: {e}"),
        })?;
        scene = scene.with_background(data_uri);
    }
    let scene = Arc::new(scene);

    let session = AnalysisSession::new(backend, config, scene.clone())
        .with_color_assigner(color_assigner(options));
    let analysis_start = Instant::now();
    let table = session.upload(resolved.bytes(), viewport).await?;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    if let Some(ref id) = options.highlight {
        if !session.highlight(id) {
            debug!("No shape for highlighted field '{}'", id);
        }
    }
    scene.write_to(output_path.as_ref()).await?;

    let field_count = session
        .last_result()
        .and_then(|r| r.documents.first().map(|d| d.fields.len()))
        .unwrap_or(0);
    Ok(AnalysisStats {
        field_count,
        shape_count: table.len(),
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    })
}

/// Start a model build from a labelled training container.
///
/// Returns the service's response body, or `{"operationLocation": …}` when
/// the build was accepted without one.
pub async fn retrain(
    source: &str,
    corrected_data: Value,
    config: &AnalyzerConfig,
) -> Result<Value, AnalysisError> {
    if source.trim().is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: source.to_string(),
            reason: "training source URL is required".into(),
        });
    }
    HttpBackend::new(config)?.retrain(source, corrected_data).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally, so it must not be called
/// from inside one.
///
/// ```rust,no_run
/// use dua_overlay::{analyze_sync, AnalyzeOptions, AnalyzerConfig};
///
/// let config = AnalyzerConfig::from_env();
/// let output = analyze_sync("dua.pdf", &config, &AnalyzeOptions::default())?;
/// println!("{} shapes on a {:?} surface", output.shapes.len(), output.viewport);
/// # Ok::<(), dua_overlay::AnalysisError>(())
/// ```
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(analyze(input_str, config, options))
}

async fn viewport_for(
    resolved: &ResolvedInput,
    config: &AnalyzerConfig,
    options: &AnalyzeOptions,
) -> Result<PageViewport, AnalysisError> {
    match options.viewport {
        Some(v) => Ok(v),
        None => render::page_viewport(resolved.path(), config.page_index).await,
    }
}

fn color_assigner(options: &AnalyzeOptions) -> Box<dyn ColorAssigner> {
    match options.color_seed {
        Some(seed) => Box::new(PaletteColorAssigner::seeded(seed)),
        None => Box::new(PaletteColorAssigner::new()),
    }
}
