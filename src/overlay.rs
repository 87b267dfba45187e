//! Identity-to-shape table and timed highlight.
//!
//! After a render pass the session keeps a [`ShapeTable`] mapping every
//! [`FieldId`] to the renderer handles drawn for it. Later interactions
//! (hover, click, a list of extracted values) look shapes up by identity
//! instead of re-deriving geometry.
//!
//! The table is replaced wholesale on every upload: [`OverlayState::install`]
//! builds the new table first and swaps an `Arc` under the lock, so a reader
//! never observes a half-populated table. Highlight reverts are Tokio tasks
//! tracked per drawn shape: a newer highlight touching a shape aborts that
//! shape's pending revert whether it named the field or one of its regions.
//! Installing a new table aborts all of them.

use crate::config::HighlightStyle;
use crate::geometry::{FieldId, FieldShape};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Renderer-side handle of one drawn shape: its index in the draw order.
pub type ShapeHandle = usize;

/// The surface shapes are drawn onto.
///
/// Implementations use interior mutability: a highlight revert runs on a
/// separate task and calls back into the renderer.
pub trait OverlayRenderer: Send + Sync {
    /// Replace everything drawn with `shapes`; shape `i` gets handle `i`.
    fn draw(&self, shapes: &[FieldShape]);

    /// Change the stroke width of one drawn shape.
    fn set_stroke_width(&self, handle: ShapeHandle, width: f64);
}

/// Field identity → drawn shapes, for one render pass.
#[derive(Debug, Clone, Default)]
pub struct ShapeTable {
    shapes: Vec<FieldShape>,
    by_id: HashMap<FieldId, Vec<ShapeHandle>>,
}

impl ShapeTable {
    pub fn new(shapes: Vec<FieldShape>) -> Self {
        let mut by_id: HashMap<FieldId, Vec<ShapeHandle>> = HashMap::new();
        for (handle, shape) in shapes.iter().enumerate() {
            by_id.entry(shape.field_id.clone()).or_default().push(handle);
        }
        Self { shapes, by_id }
    }

    /// Handles drawn for `id`.
    ///
    /// A bare field id (no region index) also matches every region of a
    /// multi-region field. Unknown ids yield an empty list.
    pub fn lookup(&self, id: &FieldId) -> Vec<ShapeHandle> {
        if let Some(handles) = self.by_id.get(id) {
            return handles.clone();
        }
        if id.region.is_some() {
            return Vec::new();
        }
        let mut handles: Vec<ShapeHandle> = self
            .by_id
            .iter()
            .filter(|(k, _)| k.name == id.name)
            .flat_map(|(_, v)| v.iter().copied())
            .collect();
        handles.sort_unstable();
        handles
    }

    pub fn shapes(&self) -> &[FieldShape] {
        &self.shapes
    }

    pub fn get(&self, handle: ShapeHandle) -> Option<&FieldShape> {
        self.shapes.get(handle)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

struct Inner {
    table: Arc<ShapeTable>,
    reverts: HashMap<ShapeHandle, JoinHandle<()>>,
}

impl Inner {
    fn cancel_reverts(&mut self) {
        for (_, handle) in self.reverts.drain() {
            handle.abort();
        }
    }
}

/// The rendered overlay of one session: renderer, current table, and the
/// highlight reverts still pending against it.
pub struct OverlayState {
    renderer: Arc<dyn OverlayRenderer>,
    inner: Mutex<Inner>,
}

impl OverlayState {
    pub fn new(renderer: Arc<dyn OverlayRenderer>) -> Self {
        Self {
            renderer,
            inner: Mutex::new(Inner {
                table: Arc::new(ShapeTable::default()),
                reverts: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Draw `shapes` and make them the current table, discarding the old one.
    pub fn install(&self, shapes: Vec<FieldShape>) -> Arc<ShapeTable> {
        let table = Arc::new(ShapeTable::new(shapes));
        let mut inner = self.lock();
        inner.cancel_reverts();
        self.renderer.draw(table.shapes());
        inner.table = Arc::clone(&table);
        debug!("Installed shape table with {} shapes", table.len());
        table
    }

    /// Drop the current table and every pending revert.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.cancel_reverts();
        self.renderer.draw(&[]);
        inner.table = Arc::new(ShapeTable::default());
    }

    /// Snapshot of the current table.
    pub fn table(&self) -> Arc<ShapeTable> {
        Arc::clone(&self.lock().table)
    }

    pub fn renderer(&self) -> &Arc<dyn OverlayRenderer> {
        &self.renderer
    }

    /// Emphasise the shapes of `id`, reverting after `style.duration_ms`.
    ///
    /// Returns `false` (and does nothing) when `id` is not in the table.
    /// Must be called from within a Tokio runtime: the revert is a spawned
    /// task.
    pub fn highlight(&self, id: &FieldId, style: &HighlightStyle) -> bool {
        let mut inner = self.lock();
        let handles = inner.table.lookup(id);
        if handles.is_empty() {
            debug!("Highlight of unknown field '{}' ignored", id);
            return false;
        }

        let normal = style.normal_stroke_width;
        let delay = Duration::from_millis(style.duration_ms);
        for h in handles {
            if let Some(previous) = inner.reverts.remove(&h) {
                previous.abort();
            }
            self.renderer.set_stroke_width(h, style.transient_stroke_width);

            let renderer = Arc::clone(&self.renderer);
            let revert = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                renderer.set_stroke_width(h, normal);
            });
            inner.reverts.insert(h, revert);
        }
        true
    }
}

impl Drop for OverlayState {
    fn drop(&mut self) {
        self.lock().cancel_reverts();
    }
}

/// Highlight `id` on `state`; see [`OverlayState::highlight`].
pub fn highlight(
    state: &OverlayState,
    id: &FieldId,
    transient_stroke_width: f64,
    normal_stroke_width: f64,
    duration_ms: u64,
) -> bool {
    state.highlight(
        id,
        &HighlightStyle {
            transient_stroke_width,
            normal_stroke_width,
            duration_ms,
        },
    )
}
