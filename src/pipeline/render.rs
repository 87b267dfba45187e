//! PDF page collaborator: page size and background raster via pdfium.
//!
//! The overlay is drawn at the page's natural size (1 pt = 1 px, the same
//! viewport a browser PDF viewer uses at scale 1), so the target surface
//! dimensions come straight from the page box.
//!
//! pdfium is not async-safe; every call runs in `spawn_blocking`.

use crate::error::AnalysisError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pixel size of the surface a page is rendered onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageViewport {
    pub width: f64,
    pub height: f64,
}

/// Bind pdfium from `PDFIUM_LIB_PATH` when set, else from the system.
fn bind_pdfium() -> Result<Pdfium, AnalysisError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AnalysisError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, AnalysisError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| AnalysisError::Render {
            page: 0,
            detail: format!("cannot open '{}': {e:?}", path.display()),
        })
}

/// pdfium addresses pages with a `u16`; larger indices cannot exist.
fn pdfium_page_index(page_index: usize) -> Result<u16, AnalysisError> {
    u16::try_from(page_index).map_err(|_| AnalysisError::Render {
        page: page_index.saturating_add(1),
        detail: format!("page index {page_index} is beyond pdfium's {} page limit", u16::MAX),
    })
}

/// Natural size of page `page_index` (0-based) in points.
pub async fn page_viewport(pdf_path: &Path, page_index: usize) -> Result<PageViewport, AnalysisError> {
    let index = pdfium_page_index(page_index)?;
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open(&pdfium, &path)?;
        let pages = document.pages();
        let page = pages
            .get(index)
            .map_err(|e| AnalysisError::Render {
                page: page_index + 1,
                detail: format!("{e:?}"),
            })?;
        let viewport = PageViewport {
            width: page.width().value as f64,
            height: page.height().value as f64,
        };
        debug!(
            "Page {} viewport {}x{} pt",
            page_index + 1,
            viewport.width,
            viewport.height
        );
        Ok(viewport)
    })
    .await
    .map_err(|e| AnalysisError::Internal(format!("Viewport task panicked: {e}")))?
}

/// Rasterise page `page_index` at exactly `width × height` pixels.
pub async fn render_page(
    pdf_path: &Path,
    page_index: usize,
    viewport: PageViewport,
) -> Result<DynamicImage, AnalysisError> {
    let index = pdfium_page_index(page_index)?;
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open(&pdfium, &path)?;
        let render_err = |e: PdfiumError| AnalysisError::Render {
            page: page_index + 1,
            detail: format!("{e:?}"),
        };
        let pages = document.pages();
        let page = pages.get(index).map_err(render_err)?;

        let config = PdfRenderConfig::new()
            .set_target_width(viewport.width.round() as i32)
            .set_target_height(viewport.height.round() as i32);
        let image = page.render_with_config(&config).map_err(render_err)?.as_image();
        info!(
            "Rendered page {} → {}x{} px",
            page_index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    })
    .await
    .map_err(|e| AnalysisError::Internal(format!("Render task panicked: {e}")))?
}
