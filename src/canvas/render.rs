//! Rate-limited renderer over the shape model
//!
//! The renderer is read-only over shapes. Actual pixel output goes through
//! the [`Painter`] trait so the core stays host-agnostic; a
//! [`RecordingPainter`] is provided for tests and the demo binary.
//!
//! # Redraw coalescing
//!
//! Redraws are debounced to 60 Hz: a redraw request arms a deadline if none
//! is armed; further requests inside the interval are absorbed, and the
//! repaint that eventually fires uses the latest state. Independently of
//! whether a repaint fires, *every* request synchronously stores a full copy
//! of the canvas as the observed state — the step scheduler snapshots from
//! it, so snapshots are never stale relative to the visible surface.
//!
//! # Images
//!
//! Images are drawn through a cache keyed by URL. An image that has not
//! finished loading is skipped for this repaint; when the host reports the
//! load complete, exactly one more redraw is requested.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tracing::trace;

use super::shape::{HAlign, Point, Shape, VAlign};
use super::{Canvas, CanvasSnapshot};

/// Minimum spacing between repaints (1/60 s).
pub const REDRAW_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Host-side drawing primitives, one call per visible shape.
pub trait Painter {
    fn clear(&mut self, width: f64, height: f64);
    fn rect(&mut self, left_x: f64, top_y: f64, width: f64, height: f64, fill: &str, outline: &str);
    /// Ellipse given by center and radii.
    fn oval(
        &mut self,
        center_x: f64,
        center_y: f64,
        radius_x: f64,
        radius_y: f64,
        fill: &str,
        outline: &str,
    );
    fn line(&mut self, start: Point, end: Point, color: &str);
    #[allow(clippy::too_many_arguments)]
    fn text(
        &mut self,
        x: f64,
        y: f64,
        text: &str,
        font: &str,
        size: &str,
        color: &str,
        halign: HAlign,
        valign: VAlign,
    );
    /// Closed path over a flat vertex list.
    fn polygon(&mut self, coordinates: &[f64], fill: &str, outline: &str);
    /// Draw an already-loaded image; `width`/`height` are the explicit
    /// dimensions if the shape carries them, otherwise natural size.
    fn image(&mut self, x: f64, y: f64, url: &str, width: Option<f64>, height: Option<f64>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ImageState {
    Loading,
    Loaded,
}

/// Renderer state: coalescing timer, observed-state copy, accessibility
/// summary, and the image cache.
#[derive(Debug)]
pub struct Renderer {
    scheduled_at: Option<Instant>,
    observed: Option<CanvasSnapshot>,
    alt_text: String,
    images: FxHashMap<String, ImageState>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            scheduled_at: None,
            observed: None,
            alt_text: String::new(),
            images: FxHashMap::default(),
        }
    }

    /// Ask for a repaint. Stores the observed state synchronously and arms
    /// the 60 Hz deadline if no repaint is already scheduled.
    pub fn request_redraw(&mut self, canvas: &Canvas, now: Instant) {
        self.observed = Some(canvas.snapshot());
        if self.scheduled_at.is_none() {
            self.scheduled_at = Some(now + REDRAW_INTERVAL);
            trace!(shapes = canvas.shape_count(), "redraw scheduled");
        }
    }

    /// Fire the pending repaint if its deadline has passed. Returns whether
    /// a repaint happened. Multiple requests inside one interval produce
    /// exactly one repaint, using the canvas state at fire time.
    pub fn tick(&mut self, canvas: &Canvas, painter: &mut dyn Painter, now: Instant) -> bool {
        match self.scheduled_at {
            Some(deadline) if now >= deadline => {
                self.scheduled_at = None;
                self.repaint(canvas, painter);
                true
            }
            _ => false,
        }
    }

    /// Whether a repaint is currently armed.
    pub fn redraw_pending(&self) -> bool {
        self.scheduled_at.is_some()
    }

    /// The last observed canvas state, captured at the most recent redraw
    /// request (not the most recent repaint).
    pub fn observed_state(&self) -> Option<&CanvasSnapshot> {
        self.observed.as_ref()
    }

    /// The accessibility summary composed by the last repaint.
    pub fn alt_text(&self) -> &str {
        &self.alt_text
    }

    /// Host callback: an image finished loading. Requests one more redraw
    /// so the deferred draw happens.
    pub fn complete_image_load(&mut self, canvas: &Canvas, url: &str, now: Instant) {
        if let Some(state) = self.images.get_mut(url) {
            *state = ImageState::Loaded;
        } else {
            self.images.insert(url.to_string(), ImageState::Loaded);
        }
        self.request_redraw(canvas, now);
    }

    /// URLs whose load has been requested but not yet reported complete.
    pub fn pending_images(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .images
            .iter()
            .filter(|(_, state)| **state == ImageState::Loading)
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    fn repaint(&mut self, canvas: &Canvas, painter: &mut dyn Painter) {
        self.alt_text = compose_alt_text(canvas);
        painter.clear(canvas.width(), canvas.height());
        for shape in canvas.shapes().values() {
            if shape.is_hidden() {
                continue;
            }
            self.paint_shape(shape, painter);
        }
    }

    fn paint_shape(&mut self, shape: &Shape, painter: &mut dyn Painter) {
        match shape {
            Shape::Rect {
                left_x,
                top_y,
                right_x,
                bottom_y,
                color,
                outline,
                ..
            } => {
                painter.rect(
                    *left_x,
                    *top_y,
                    right_x - left_x,
                    bottom_y - top_y,
                    color,
                    outline,
                );
            }
            Shape::Oval {
                left_x,
                top_y,
                right_x,
                bottom_y,
                color,
                outline,
                ..
            } => {
                let width = right_x - left_x;
                let height = bottom_y - top_y;
                painter.oval(
                    left_x + width / 2.0,
                    top_y + height / 2.0,
                    width / 2.0,
                    height / 2.0,
                    color,
                    outline,
                );
            }
            Shape::Line {
                start, end, color, ..
            } => {
                painter.line(*start, *end, color);
            }
            Shape::Text {
                x,
                y,
                text,
                anchor,
                color,
                size,
                font,
                ..
            } => {
                let (halign, valign) = anchor.alignment();
                painter.text(*x, *y, text, font, size, color, halign, valign);
            }
            Shape::Polygon {
                coordinates,
                color,
                outline,
                ..
            } => {
                painter.polygon(coordinates, color, outline);
            }
            Shape::Image {
                x,
                y,
                url,
                width,
                height,
                ..
            } => match self.images.get(url) {
                Some(ImageState::Loaded) => {
                    painter.image(*x, *y, url, *width, *height);
                }
                Some(ImageState::Loading) => {}
                None => {
                    // Drawing is deferred until the host reports the load.
                    self.images.insert(url.clone(), ImageState::Loading);
                }
            },
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Textual summary of the canvas for the surface's accessible label.
///
/// Hidden shapes are included: the summary describes the shape model, not
/// the last repaint.
pub fn compose_alt_text(canvas: &Canvas) -> String {
    let count = canvas.shape_count();
    if count == 0 {
        return "The canvas is currently blank.".to_string();
    }
    let mut out = if count == 1 {
        "There is 1 shape on the canvas.\n".to_string()
    } else {
        format!("There are {} shapes on the canvas.\n", count)
    };
    for shape in canvas.shapes().values() {
        describe_shape(shape, &mut out);
    }
    out
}

fn capitalized(color: &str) -> String {
    let mut chars = color.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn describe_shape(shape: &Shape, out: &mut String) {
    match shape {
        Shape::Oval {
            left_x,
            top_y,
            right_x,
            bottom_y,
            color,
            outline,
            ..
        } => {
            out.push_str(&format!(
                "{} oval with {} outline starting at ({}, {}) and ending at ({}, {}).\n",
                capitalized(color),
                outline,
                left_x,
                top_y,
                right_x,
                bottom_y
            ));
        }
        Shape::Rect {
            left_x,
            top_y,
            right_x,
            bottom_y,
            color,
            outline,
            ..
        } => {
            out.push_str(&format!(
                "{} rectangle with {} outline starting at ({}, {}) and ending at ({}, {}).\n",
                capitalized(color),
                outline,
                left_x,
                top_y,
                right_x,
                bottom_y
            ));
        }
        Shape::Line {
            start, end, color, ..
        } => {
            out.push_str(&format!(
                "{} line starting at {} and ending at {}.\n",
                capitalized(color),
                start,
                end
            ));
        }
        Shape::Image {
            x,
            y,
            width,
            height,
            ..
        } => {
            out.push_str(&format!("Image positioned at ({}, {}).\n", x, y));
            if let (Some(w), Some(h)) = (width, height) {
                out.push_str(&format!("Image has height of {} and width of {}", h, w));
            }
        }
        Shape::Text {
            x,
            y,
            text,
            color,
            size,
            font,
            ..
        } => {
            out.push_str(&format!("Text positioned at ({}, {}).\n", x, y));
            out.push_str(&format!(
                "The text is styled with {} font size, {} color, and {} font.\n",
                size, color, font
            ));
            out.push_str(&format!("Text content: {}.\n", text));
        }
        Shape::Polygon {
            coordinates,
            color,
            outline,
            ..
        } => {
            let vertices = coordinates
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "{} polygon with {} outline. Vertices at {}.\n",
                capitalized(color),
                outline,
                vertices
            ));
        }
    }
}

/// Paint operations captured by the [`RecordingPainter`].
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Clear { width: f64, height: f64 },
    Rect { left_x: f64, top_y: f64, width: f64, height: f64, fill: String, outline: String },
    Oval { center_x: f64, center_y: f64, radius_x: f64, radius_y: f64, fill: String, outline: String },
    Line { start: Point, end: Point, color: String },
    Text { x: f64, y: f64, text: String, halign: HAlign, valign: VAlign },
    Polygon { vertices: usize, fill: String, outline: String },
    Image { x: f64, y: f64, url: String, width: Option<f64>, height: Option<f64> },
}

/// A painter that records every call, for tests and the demo binary.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub ops: Vec<PaintOp>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations since the last clear (i.e. the current frame).
    pub fn current_frame(&self) -> &[PaintOp] {
        let start = self
            .ops
            .iter()
            .rposition(|op| matches!(op, PaintOp::Clear { .. }))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.ops[start..]
    }
}

impl Painter for RecordingPainter {
    fn clear(&mut self, width: f64, height: f64) {
        self.ops.push(PaintOp::Clear { width, height });
    }

    fn rect(&mut self, left_x: f64, top_y: f64, width: f64, height: f64, fill: &str, outline: &str) {
        self.ops.push(PaintOp::Rect {
            left_x,
            top_y,
            width,
            height,
            fill: fill.to_string(),
            outline: outline.to_string(),
        });
    }

    fn oval(
        &mut self,
        center_x: f64,
        center_y: f64,
        radius_x: f64,
        radius_y: f64,
        fill: &str,
        outline: &str,
    ) {
        self.ops.push(PaintOp::Oval {
            center_x,
            center_y,
            radius_x,
            radius_y,
            fill: fill.to_string(),
            outline: outline.to_string(),
        });
    }

    fn line(&mut self, start: Point, end: Point, color: &str) {
        self.ops.push(PaintOp::Line {
            start,
            end,
            color: color.to_string(),
        });
    }

    fn text(
        &mut self,
        x: f64,
        y: f64,
        text: &str,
        _font: &str,
        _size: &str,
        _color: &str,
        halign: HAlign,
        valign: VAlign,
    ) {
        self.ops.push(PaintOp::Text {
            x,
            y,
            text: text.to_string(),
            halign,
            valign,
        });
    }

    fn polygon(&mut self, coordinates: &[f64], fill: &str, outline: &str) {
        self.ops.push(PaintOp::Polygon {
            vertices: coordinates.len() / 2,
            fill: fill.to_string(),
            outline: outline.to_string(),
        });
    }

    fn image(&mut self, x: f64, y: f64, url: &str, width: Option<f64>, height: Option<f64>) {
        self.ops.push(PaintOp::Image {
            x,
            y,
            url: url.to_string(),
            width,
            height,
        });
    }
}
