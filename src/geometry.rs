//! Page-unit polygons → canvas-pixel rectangles.
//!
//! The analysis service reports every field location as a quadrilateral in
//! the page's own unit (inches for PDFs, pixels for images). Rendering maps
//! those into the target surface with one [`ScaleFactors`] per pass:
//!
//! ```text
//! x' = x * target_width  / page.width
//! y' = y * target_height / page.height
//! ```
//!
//! Only the first and third polygon points are used. They are opposing
//! corners of the quad, so a rotated quad collapses to the box spanned by
//! those two points. Corner order is not trusted: the box is normalised
//! with `min`/`abs` so a reversed winding never yields negative sizes.

use crate::color::{Color, ColorAssigner};
use crate::error::AnalysisError;
use crate::model::{AnalysisResult, Document, Page};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Ratio between target surface pixels and source page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    pub width_scale: f64,
    pub height_scale: f64,
}

impl ScaleFactors {
    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.width_scale, y * self.height_scale)
    }
}

/// Scale factors mapping `page` onto a `target_width × target_height` surface.
///
/// # Errors
/// * [`AnalysisError::InvalidPageDimensions`] — page width or height ≤ 0
/// * [`AnalysisError::InvalidConfig`] — target width or height ≤ 0
pub fn compute_scale(
    page: &Page,
    target_width: f64,
    target_height: f64,
) -> Result<ScaleFactors, AnalysisError> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(page.width) || !positive(page.height) {
        return Err(AnalysisError::InvalidPageDimensions {
            width: page.width,
            height: page.height,
        });
    }
    if !positive(target_width) || !positive(target_height) {
        return Err(AnalysisError::InvalidConfig(format!(
            "target surface must be positive, got {target_width}x{target_height}"
        )));
    }
    Ok(ScaleFactors {
        width_scale: target_width / page.width,
        height_scale: target_height / page.height,
    })
}

/// Identity of one rendered shape.
///
/// A field with a single region on the page is identified by its name; a
/// field with several regions gets one id per region, `name#index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<usize>,
}

impl FieldId {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
        }
    }

    pub fn region(name: impl Into<String>, region: usize) -> Self {
        Self {
            name: name.into(),
            region: Some(region),
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.region {
            Some(i) => write!(f, "{}#{}", self.name, i),
            None => f.write_str(&self.name),
        }
    }
}

/// Parses `name` or `name#index`. A `#` followed by anything other than a
/// number is kept as part of the name.
impl std::str::FromStr for FieldId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((name, idx)) = s.rsplit_once('#') {
            if let Ok(region) = idx.parse::<usize>() {
                return Ok(Self::region(name, region));
            }
        }
        Ok(Self::field(s))
    }
}

/// One render-ready rectangle in target-surface pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldShape {
    pub field_id: FieldId,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
    /// Extracted value, or the field name when the service returned none.
    pub label: String,
}

/// Shapes for every region of `document` that lies on `page_index`.
///
/// Fields are visited in document order and regions in service order, so
/// identical inputs always produce identical output. Regions whose polygon
/// has fewer than four points are skipped.
pub fn build_shapes(
    document: &Document,
    scale: &ScaleFactors,
    page_index: usize,
    colors: &mut dyn ColorAssigner,
) -> Vec<FieldShape> {
    let mut shapes = Vec::new();

    for (name, field) in &document.fields {
        let regions: Vec<_> = field
            .bounding_regions
            .iter()
            .filter(|r| r.page_index() == page_index)
            .collect();
        if regions.is_empty() {
            continue;
        }

        let color = colors.assign(name);
        let label = field
            .value_string
            .clone()
            .unwrap_or_else(|| name.clone());
        let multi = regions.len() > 1;

        for (i, region) in regions.into_iter().enumerate() {
            let Some((left, top, width, height)) = region_box(&region.polygon, scale) else {
                warn!(
                    "Field '{}': polygon has {} coordinates, need 8; skipped",
                    name,
                    region.polygon.len()
                );
                continue;
            };
            let field_id = if multi {
                FieldId::region(name.clone(), i)
            } else {
                FieldId::field(name.clone())
            };
            shapes.push(FieldShape {
                field_id,
                left,
                top,
                width,
                height,
                color,
                label: label.clone(),
            });
        }
    }

    debug!("Built {} shapes for page {}", shapes.len(), page_index + 1);
    shapes
}

/// `(left, top, width, height)` of the box spanned by points 1 and 3.
fn region_box(polygon: &[f64], scale: &ScaleFactors) -> Option<(f64, f64, f64, f64)> {
    if polygon.len() < 8 {
        return None;
    }
    let (x1, y1) = scale.map_point(polygon[0], polygon[1]);
    let (x3, y3) = scale.map_point(polygon[4], polygon[5]);
    Some((x1.min(x3), y1.min(y3), (x3 - x1).abs(), (y3 - y1).abs()))
}

/// Shapes for `pages[page_index]` of `documents[0]`, scaled to the target.
///
/// Further documents in the result are not rendered.
///
/// # Errors
/// [`AnalysisError::MalformedResult`] when the page or the first document is
/// missing, plus the errors of [`compute_scale`].
pub fn reconcile(
    result: &AnalysisResult,
    page_index: usize,
    target_width: f64,
    target_height: f64,
    colors: &mut dyn ColorAssigner,
) -> Result<Vec<FieldShape>, AnalysisError> {
    let page = result.pages.get(page_index).ok_or_else(|| {
        AnalysisError::MalformedResult(format!(
            "result has {} pages, page {} requested",
            result.pages.len(),
            page_index + 1
        ))
    })?;
    let document = result
        .documents
        .first()
        .ok_or_else(|| AnalysisError::MalformedResult("result has no documents".into()))?;
    if result.documents.len() > 1 {
        debug!(
            "Result has {} documents; rendering the first only",
            result.documents.len()
        );
    }

    let scale = compute_scale(page, target_width, target_height)?;
    Ok(build_shapes(document, &scale, page_index, colors))
}
