//! One interactive upload session.
//!
//! ```text
//! Idle ──▶ Submitting ──▶ Polling ──┬─▶ Rendered
//!   ▲                               └─▶ Failed
//!   └──────── next upload ◀─────────────┘
//! ```
//!
//! A session runs at most one analysis at a time; a second `upload` while
//! one is in flight fails with [`AnalysisError::SessionBusy`] instead of
//! racing to populate the same shape table. Shapes are built only from a
//! terminal result and installed in one swap, so a failed upload leaves the
//! previous overlay exactly as it was.

use crate::backend::AnalysisBackend;
use crate::color::{ColorAssigner, PaletteColorAssigner};
use crate::config::{AnalyzerConfig, HighlightStyle, PollPolicy};
use crate::error::AnalysisError;
use crate::geometry::{reconcile, FieldId};
use crate::model::AnalysisResult;
use crate::overlay::{OverlayRenderer, OverlayState, ShapeTable};
use crate::pipeline::render::PageViewport;
use crate::poller;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Where a session is in its upload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Submitting,
    Polling,
    Rendered,
    Failed,
}

/// Drives uploads through the poller and reconciler into an overlay.
pub struct AnalysisSession {
    backend: Arc<dyn AnalysisBackend>,
    policy: PollPolicy,
    progress: Option<ProgressCallback>,
    page_index: usize,
    highlight_style: HighlightStyle,
    colors: Mutex<Box<dyn ColorAssigner>>,
    overlay: OverlayState,
    state: Mutex<SessionState>,
    last_result: Mutex<Option<Arc<AnalysisResult>>>,
    active: tokio::sync::Mutex<()>,
}

impl AnalysisSession {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        config: &AnalyzerConfig,
        renderer: Arc<dyn OverlayRenderer>,
    ) -> Self {
        Self {
            backend,
            policy: config.poll_policy(),
            progress: config.progress_callback.clone(),
            page_index: config.page_index,
            highlight_style: config.highlight,
            colors: Mutex::new(Box::new(PaletteColorAssigner::new())),
            overlay: OverlayState::new(renderer),
            state: Mutex::new(SessionState::Idle),
            last_result: Mutex::new(None),
            active: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the colour assigner (e.g. a seeded one for reproducible output).
    pub fn with_color_assigner(self, colors: Box<dyn ColorAssigner>) -> Self {
        *self.colors.lock().unwrap_or_else(|e| e.into_inner()) = colors;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Result of the last successful upload.
    pub fn last_result(&self) -> Option<Arc<AnalysisResult>> {
        self.last_result
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current identity-to-shape table.
    pub fn table(&self) -> Arc<ShapeTable> {
        self.overlay.table()
    }

    /// Analyse `document` and render its fields onto a `viewport`-sized surface.
    ///
    /// Every error is terminal for this upload; the session ends in
    /// [`SessionState::Failed`] and the next call starts over from `Idle`.
    pub async fn upload(
        &self,
        document: &[u8],
        viewport: PageViewport,
    ) -> Result<Arc<ShapeTable>, AnalysisError> {
        let _active = self
            .active
            .try_lock()
            .map_err(|_| AnalysisError::SessionBusy)?;

        self.set_state(SessionState::Idle);
        let outcome = self.run(document, viewport).await;
        match &outcome {
            Ok(table) => {
                self.set_state(SessionState::Rendered);
                info!("Session rendered {} shapes", table.len());
            }
            Err(e) => {
                self.set_state(SessionState::Failed);
                warn!("Upload failed [{}]: {}", e.kind(), e);
            }
        }
        outcome
    }

    async fn run(
        &self,
        document: &[u8],
        viewport: PageViewport,
    ) -> Result<Arc<ShapeTable>, AnalysisError> {
        self.set_state(SessionState::Submitting);
        let job = poller::submit(self.backend.as_ref(), document).await?;
        if let Some(ref cb) = self.progress {
            cb.on_submitted(&job.operation_handle);
        }

        self.set_state(SessionState::Polling);
        let result = poller::await_completion(
            self.backend.as_ref(),
            &job,
            &self.policy,
            self.progress.as_ref(),
        )
        .await?;

        self.render(result, viewport)
    }

    /// Reconcile an already-terminal result and install its shapes.
    ///
    /// Colours are drawn fresh for every call. On error the previous table
    /// stays in place.
    pub fn render(
        &self,
        result: AnalysisResult,
        viewport: PageViewport,
    ) -> Result<Arc<ShapeTable>, AnalysisError> {
        let shapes = {
            let mut colors = self.colors.lock().unwrap_or_else(|e| e.into_inner());
            colors.reset();
            reconcile(
                &result,
                self.page_index,
                viewport.width,
                viewport.height,
                colors.as_mut(),
            )?
        };
        let table = self.overlay.install(shapes);
        *self.last_result.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(result));
        Ok(table)
    }

    /// Emphasise `id` with the configured style; unknown ids are ignored.
    pub fn highlight(&self, id: &FieldId) -> bool {
        self.overlay.highlight(id, &self.highlight_style)
    }

    /// Emphasise `id` with an explicit style.
    pub fn highlight_with(&self, id: &FieldId, style: &HighlightStyle) -> bool {
        self.overlay.highlight(id, style)
    }

    /// Return to `Idle`, discarding the overlay, colours and last result.
    ///
    /// Fails with [`AnalysisError::SessionBusy`] while an upload is running.
    pub fn reset(&self) -> Result<(), AnalysisError> {
        let _active = self
            .active
            .try_lock()
            .map_err(|_| AnalysisError::SessionBusy)?;
        self.overlay.clear();
        self.colors.lock().unwrap_or_else(|e| e.into_inner()).reset();
        *self.last_result.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_state(SessionState::Idle);
        Ok(())
    }
}
