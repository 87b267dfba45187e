//! SVG overlay renderer.
//!
//! Draws each shape as a translucent rectangle in its field colour with the
//! field's label just above it, optionally over the rasterised page as a
//! background image. The scene keeps per-shape stroke widths so highlight
//! state is visible in the serialised output.

use crate::error::AnalysisError;
use crate::geometry::FieldShape;
use crate::overlay::{OverlayRenderer, ShapeHandle};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const FILL_ALPHA: f64 = 0.1;
const LABEL_FONT_SIZE: f64 = 16.0;
/// Labels sit this far above the top edge of their box.
const LABEL_OFFSET: f64 = 4.0;

#[derive(Debug, Clone)]
struct Drawn {
    shape: FieldShape,
    stroke_width: f64,
}

/// An in-memory SVG canvas implementing [`OverlayRenderer`].
#[derive(Debug)]
pub struct SvgScene {
    width: f64,
    height: f64,
    normal_stroke_width: f64,
    background: Option<String>,
    drawn: Mutex<Vec<Drawn>>,
}

impl SvgScene {
    pub fn new(width: f64, height: f64, normal_stroke_width: f64) -> Self {
        Self {
            width,
            height,
            normal_stroke_width,
            background: None,
            drawn: Mutex::new(Vec::new()),
        }
    }

    /// Paint `data_uri` (e.g. a base64 PNG of the page) under the shapes.
    pub fn with_background(mut self, data_uri: impl Into<String>) -> Self {
        self.background = Some(data_uri.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Drawn>> {
        self.drawn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn shape_count(&self) -> usize {
        self.lock().len()
    }

    /// Current stroke width of a drawn shape.
    pub fn stroke_width(&self, handle: ShapeHandle) -> Option<f64> {
        self.lock().get(handle).map(|d| d.stroke_width)
    }

    /// Serialise the scene as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        );
        if let Some(ref uri) = self.background {
            let _ = writeln!(
                out,
                r#"  <image x="0" y="0" width="{}" height="{}" href="{}"/>"#,
                self.width,
                self.height,
                html_escape::encode_double_quoted_attribute(uri),
            );
        }
        for d in self.lock().iter() {
            let s = &d.shape;
            let _ = writeln!(
                out,
                r#"  <g data-field="{id}">"#,
                id = html_escape::encode_double_quoted_attribute(&s.field_id.to_string()),
            );
            let _ = writeln!(
                out,
                r#"    <rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{fill}" stroke="{stroke}" stroke-width="{sw}"/>"#,
                x = s.left,
                y = s.top,
                w = s.width,
                h = s.height,
                fill = s.color.to_rgba(FILL_ALPHA),
                stroke = s.color.to_hex(),
                sw = d.stroke_width,
            );
            let _ = writeln!(
                out,
                r#"    <text x="{x:.2}" y="{y:.2}" font-size="{fs}" fill="{fill}">{label}</text>"#,
                x = s.left,
                y = s.top - LABEL_OFFSET,
                fs = LABEL_FONT_SIZE,
                fill = s.color.to_hex(),
                label = html_escape::encode_text(&s.label),
            );
            out.push_str("  </g>\n");
        }
        out.push_str("</svg>\n");
        out
    }

    /// Write the SVG atomically (temp file + rename).
    pub async fn write_to(&self, path: &Path) -> Result<(), AnalysisError> {
        let svg = self.to_svg();
        let write_err = |source| AnalysisError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp_path = path.with_extension("svg.tmp");
        tokio::fs::write(&tmp_path, svg).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
        Ok(())
    }
}

impl OverlayRenderer for SvgScene {
    fn draw(&self, shapes: &[FieldShape]) {
        let stroke_width = self.normal_stroke_width;
        *self.lock() = shapes
            .iter()
            .cloned()
            .map(|shape| Drawn {
                shape,
                stroke_width,
            })
            .collect();
    }

    fn set_stroke_width(&self, handle: ShapeHandle, width: f64) {
        if let Some(d) = self.lock().get_mut(handle) {
            d.stroke_width = width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::FieldId;

    fn scene_with_one() -> SvgScene {
        let scene = SvgScene::new(800.0, 1200.0, 2.0);
        scene.draw(&[FieldShape {
            field_id: FieldId::field("Exporter"),
            left: 80.0,
            top: 80.0,
            width: 640.0,
            height: 160.0,
            color: Color::BLUE,
            label: "ACME <S.L.> & Co".into(),
        }]);
        scene
    }

    #[test]
    fn renders_rect_and_escaped_label() {
        let svg = scene_with_one().to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"<rect x="80.00" y="80.00" width="640.00" height="160.00""#));
        assert!(svg.contains(r##"fill="rgba(0, 0, 255, 0.1)" stroke="#0000ff" stroke-width="2""##));
        assert!(svg.contains("ACME &lt;S.L.&gt; &amp; Co"));
        assert!(svg.contains(r#"data-field="Exporter""#));
    }

    #[test]
    fn stroke_width_tracks_updates() {
        let scene = scene_with_one();
        assert_eq!(scene.stroke_width(0), Some(2.0));
        scene.set_stroke_width(0, 4.0);
        assert_eq!(scene.stroke_width(0), Some(4.0));
        scene.set_stroke_width(9, 4.0);
        assert_eq!(scene.stroke_width(9), None);
    }

    #[test]
    fn background_is_embedded() {
        let scene = SvgScene::new(10.0, 10.0, 2.0).with_background("data:image/png;base64,AAAA");
        assert!(scene.to_svg().contains(r#"href="data:image/png;base64,AAAA""#));
    }

    #[tokio::test]
    async fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/overlay.svg");
        scene_with_one().write_to(&path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Exporter"));
    }
}
