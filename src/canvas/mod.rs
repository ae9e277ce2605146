//! Drawing-surface object model
//!
//! This module provides the in-memory store for drawing-surface entities:
//! - [`shape`]: the closed [`Shape`] variant and [`ShapeId`] allocation
//! - [`hit`]: per-kind geometric overlap predicates
//! - [`render`]: the rate-limited renderer and its [`Painter`](render::Painter) seam
//!
//! # Mutation semantics
//!
//! Every mutation that names an id is a silent no-op when the id is absent
//! or the kind does not support the operation. This permissive behavior is
//! deliberate: guest programs routinely move shapes they have already
//! deleted, and the original library ignores them rather than erroring.
//!
//! # Iteration order
//!
//! Shapes are stored in a `BTreeMap` keyed by id. Ids are monotonic and
//! never reused, so ascending-id iteration is insertion order — which keeps
//! rendering, hit-test results, and the accessibility summary deterministic.

pub mod hit;
pub mod render;
pub mod shape;

use std::collections::BTreeMap;

use hit::QueryBox;
use serde::{Deserialize, Serialize};
use shape::{Anchor, Point, Shape, ShapeId};

/// Point-in-time copy of a canvas, captured for step frames and run results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub width: f64,
    pub height: f64,
    pub shapes: BTreeMap<ShapeId, Shape>,
}

impl CanvasSnapshot {
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// The drawing surface: an ordered map from id to [`Shape`].
///
/// One canvas exists per session once the guest creates it; it is an
/// explicit instance handed to whoever needs it, never process-wide state.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: f64,
    height: f64,
    shapes: BTreeMap<ShapeId, Shape>,
    next_id: u64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Canvas {
            width,
            height,
            shapes: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Read access for the renderer and hit-tester.
    pub fn shapes(&self) -> &BTreeMap<ShapeId, Shape> {
        &self.shapes
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Capture a full copy of the canvas state.
    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            width: self.width,
            height: self.height,
            shapes: self.shapes.clone(),
        }
    }

    fn next_object_id(&mut self) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, shape: Shape) -> ShapeId {
        let id = self.next_object_id();
        self.shapes.insert(id, shape);
        id
    }

    // ========== Creation ==========

    pub fn create_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: &str) -> ShapeId {
        self.insert(Shape::Line {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
            color: color.to_string(),
            hidden: false,
        })
    }

    pub fn create_rect(
        &mut self,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: &str,
        outline: &str,
    ) -> ShapeId {
        self.insert(Shape::Rect {
            left_x,
            top_y,
            right_x,
            bottom_y,
            color: color.to_string(),
            outline: outline.to_string(),
            hidden: false,
        })
    }

    pub fn create_oval(
        &mut self,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: &str,
        outline: &str,
    ) -> ShapeId {
        self.insert(Shape::Oval {
            left_x,
            top_y,
            right_x,
            bottom_y,
            color: color.to_string(),
            outline: outline.to_string(),
            hidden: false,
        })
    }

    pub fn create_text(
        &mut self,
        x: f64,
        y: f64,
        text: &str,
        font: &str,
        size: &str,
        color: &str,
        anchor: &str,
    ) -> ShapeId {
        self.insert(Shape::Text {
            x,
            y,
            text: text.to_string(),
            anchor: Anchor::parse(anchor),
            color: color.to_string(),
            size: size.to_string(),
            font: font.to_string(),
            hidden: false,
        })
    }

    /// An image without explicit dimensions. It will render at natural size
    /// once loaded, but never participates in hit-testing.
    pub fn create_image(&mut self, x: f64, y: f64, url: &str) -> ShapeId {
        self.insert(Shape::Image {
            x,
            y,
            url: url.to_string(),
            width: None,
            height: None,
            hidden: false,
        })
    }

    pub fn create_image_with_size(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        url: &str,
    ) -> ShapeId {
        self.insert(Shape::Image {
            x,
            y,
            url: url.to_string(),
            width: Some(width),
            height: Some(height),
            hidden: false,
        })
    }

    /// Closed polygon from a flat vertex list: x0, y0, x1, y1, ...
    pub fn create_polygon(&mut self, coordinates: Vec<f64>, color: &str, outline: &str) -> ShapeId {
        self.insert(Shape::Polygon {
            coordinates,
            color: color.to_string(),
            outline: outline.to_string(),
            hidden: false,
        })
    }

    // ========== Mutation ==========

    /// Translate a shape by a relative delta. Rect and oval move all four
    /// corners, images move their position, lines move both endpoints.
    /// Text and polygon do not support relative movement; no-op.
    pub fn move_by(&mut self, id: ShapeId, dx: f64, dy: f64) {
        let Some(shape) = self.shapes.get_mut(&id) else {
            return;
        };
        match shape {
            Shape::Rect {
                left_x,
                top_y,
                right_x,
                bottom_y,
                ..
            }
            | Shape::Oval {
                left_x,
                top_y,
                right_x,
                bottom_y,
                ..
            } => {
                *left_x += dx;
                *right_x += dx;
                *top_y += dy;
                *bottom_y += dy;
            }
            Shape::Image { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            Shape::Line { start, end, .. } => {
                start.x += dx;
                start.y += dy;
                end.x += dx;
                end.y += dy;
            }
            Shape::Text { .. } | Shape::Polygon { .. } => {}
        }
    }

    /// Reposition a shape's anchor, preserving its extent: top-left corner
    /// for boxes, position for images, start point for lines.
    pub fn move_to(&mut self, id: ShapeId, new_x: f64, new_y: f64) {
        // Lines reposition relative to their start point.
        if let Some(Shape::Line { start, .. }) = self.shapes.get(&id) {
            let (dx, dy) = (new_x - start.x, new_y - start.y);
            self.move_by(id, dx, dy);
            return;
        }
        let Some(shape) = self.shapes.get_mut(&id) else {
            return;
        };
        match shape {
            Shape::Rect {
                left_x,
                top_y,
                right_x,
                bottom_y,
                ..
            }
            | Shape::Oval {
                left_x,
                top_y,
                right_x,
                bottom_y,
                ..
            } => {
                let width = *right_x - *left_x;
                let height = *bottom_y - *top_y;
                *left_x = new_x;
                *right_x = new_x + width;
                *top_y = new_y;
                *bottom_y = new_y + height;
            }
            Shape::Image { x, y, .. } => {
                *x = new_x;
                *y = new_y;
            }
            Shape::Line { .. } | Shape::Text { .. } | Shape::Polygon { .. } => {}
        }
    }

    pub fn set_hidden(&mut self, id: ShapeId, hidden: bool) {
        if let Some(shape) = self.shapes.get_mut(&id) {
            shape.set_hidden(hidden);
        }
    }

    pub fn set_fill_color(&mut self, id: ShapeId, color: &str) {
        if let Some(shape) = self.shapes.get_mut(&id) {
            shape.set_color(color);
        }
    }

    pub fn set_outline_color(&mut self, id: ShapeId, color: &str) {
        if let Some(shape) = self.shapes.get_mut(&id) {
            shape.set_outline(color);
        }
    }

    /// Replace the content of a text shape. No-op for any other kind.
    pub fn change_text(&mut self, id: ShapeId, new_text: &str) {
        if let Some(Shape::Text { text, .. }) = self.shapes.get_mut(&id) {
            *text = new_text.to_string();
        }
    }

    /// Backfill the measured natural size onto every image with this url
    /// that has no explicit dimensions. Explicit dimensions are kept. Once
    /// backfilled, the image has an extent: size queries return it and it
    /// participates in hit-testing.
    pub fn set_image_natural_size(&mut self, url: &str, width: f64, height: f64) {
        for shape in self.shapes.values_mut() {
            if let Shape::Image {
                url: shape_url,
                width: w,
                height: h,
                ..
            } = shape
            {
                if shape_url.as_str() == url {
                    if w.is_none() {
                        *w = Some(width);
                    }
                    if h.is_none() {
                        *h = Some(height);
                    }
                }
            }
        }
    }

    pub fn delete(&mut self, id: ShapeId) {
        self.shapes.remove(&id);
    }

    /// Remove every shape. The next allocated id still advances; ids are
    /// never reused within a session.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    // ========== Queries ==========

    /// Top-left coordinate pair for a shape, where defined.
    pub fn coords(&self, id: ShapeId) -> Option<(f64, f64)> {
        let shape = self.shapes.get(&id)?;
        Some((shape.left_x()?, shape.top_y()?))
    }

    pub fn left_x(&self, id: ShapeId) -> Option<f64> {
        self.shapes.get(&id)?.left_x()
    }

    pub fn top_y(&self, id: ShapeId) -> Option<f64> {
        self.shapes.get(&id)?.top_y()
    }

    pub fn shape_width(&self, id: ShapeId) -> Option<f64> {
        self.shapes.get(&id)?.width()
    }

    pub fn shape_height(&self, id: ShapeId) -> Option<f64> {
        self.shapes.get(&id)?.height()
    }

    /// Ids of all visible shapes intersecting the query rectangle.
    ///
    /// The box is shrunk by one unit on each side before testing — touching
    /// edges do not count as overlap, matching the original library's
    /// "not inclusive" rule.
    pub fn find_overlapping(
        &self,
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
    ) -> Vec<ShapeId> {
        let query = QueryBox::new(left_x + 1.0, top_y + 1.0, right_x - 1.0, bottom_y - 1.0);
        self.shapes
            .iter()
            .filter(|(_, shape)| !shape.is_hidden() && hit::overlaps(shape, &query))
            .map(|(&id, _)| id)
            .collect()
    }
}

/// The drawing surface as the guest sees it: an optional [`Canvas`] (nothing
/// exists until guest code creates one) paired with the [`Renderer`], so
/// every mutation also requests a coalesced redraw the way the original
/// library does.
///
/// One `Surface` per session, passed explicitly to the scheduler and the
/// interpreter context — never a process-wide singleton.
#[derive(Debug)]
pub struct Surface {
    canvas: Option<Canvas>,
    renderer: render::Renderer,
    init_count: u32,
    pointer: (f64, f64),
}

impl Surface {
    pub fn new() -> Self {
        Surface {
            canvas: None,
            renderer: render::Renderer::new(),
            init_count: 0,
            pointer: (-1.0, -1.0),
        }
    }

    /// Whether guest code has created a canvas this session.
    pub fn is_active(&self) -> bool {
        self.canvas.is_some()
    }

    /// How many times a canvas has been created this session.
    pub fn init_count(&self) -> u32 {
        self.init_count
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    pub fn renderer(&self) -> &render::Renderer {
        &self.renderer
    }

    /// Create (or replace) the canvas. Replacement starts a fresh shape
    /// table; ids restart because it is a new canvas instance.
    pub fn create_canvas(&mut self, width: f64, height: f64, now: std::time::Instant) {
        self.canvas = Some(Canvas::new(width, height));
        self.init_count += 1;
        self.request_redraw(now);
    }

    pub fn width(&self) -> Option<f64> {
        self.canvas.as_ref().map(Canvas::width)
    }

    pub fn height(&self) -> Option<f64> {
        self.canvas.as_ref().map(Canvas::height)
    }

    /// Last pointer position reported by the host; (-1, -1) before any.
    pub fn pointer_pos(&self) -> (f64, f64) {
        self.pointer
    }

    pub fn set_pointer_pos(&mut self, x: f64, y: f64) {
        self.pointer = (x, y);
    }

    /// Run a mutation against the canvas (no-op when inactive) and request
    /// a redraw afterwards, matching the original's call pattern.
    pub fn mutate<R>(
        &mut self,
        now: std::time::Instant,
        f: impl FnOnce(&mut Canvas) -> R,
    ) -> Option<R> {
        let result = self.canvas.as_mut().map(f);
        if result.is_some() {
            self.request_redraw(now);
        }
        result
    }

    /// Read-only canvas access for guest queries; no redraw.
    pub fn query<R>(&self, f: impl FnOnce(&Canvas) -> R) -> Option<R> {
        self.canvas.as_ref().map(f)
    }

    fn request_redraw(&mut self, now: std::time::Instant) {
        if let Some(canvas) = self.canvas.as_ref() {
            self.renderer.request_redraw(canvas, now);
        }
    }

    /// Deep copy of the live shape table, taken for step frames.
    pub fn snapshot_live(&self) -> Option<CanvasSnapshot> {
        self.canvas.as_ref().map(Canvas::snapshot)
    }

    /// The renderer's observed state: the copy stored by the most recent
    /// redraw request. Used for end-of-run results.
    pub fn observed(&self) -> Option<&CanvasSnapshot> {
        self.renderer.observed_state()
    }

    /// Fire a due repaint, if any.
    pub fn render(
        &mut self,
        painter: &mut dyn render::Painter,
        now: std::time::Instant,
    ) -> bool {
        match self.canvas.as_ref() {
            Some(canvas) => self.renderer.tick(canvas, painter, now),
            None => false,
        }
    }

    /// Host callback: an image finished loading, optionally with its
    /// measured natural size. The size is backfilled onto dimensionless
    /// images with this url before the completion redraw is requested.
    pub fn image_loaded(
        &mut self,
        url: &str,
        natural_size: Option<(f64, f64)>,
        now: std::time::Instant,
    ) {
        if let (Some(canvas), Some((width, height))) = (self.canvas.as_mut(), natural_size) {
            canvas.set_image_natural_size(url, width, height);
        }
        if let Some(canvas) = self.canvas.as_ref() {
            self.renderer.complete_image_load(canvas, url, now);
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}
