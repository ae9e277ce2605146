//! Geometric hit-testing for `find_overlapping`
//!
//! Per-kind overlap predicates against an axis-aligned query box:
//!
//! - rect/oval: treated identically as bounding-box overlap. Two boxes
//!   overlap unless one is strictly separated from the other on either axis.
//! - line: overlaps if either endpoint lies inside the box, or the segment
//!   crosses any of the box's four edges (parametric two-segment test).
//! - image: only hit-testable when it carries explicit width *and* height;
//!   then tested as a bounding box. An image without dimensions never
//!   overlaps anything. This is policy carried over from the original
//!   library, not a geometric necessity.
//! - text and polygon: never reported as overlapping (no hit geometry
//!   defined). Same caveat as images.

use super::shape::{Point, Shape};

/// Axis-aligned query rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBox {
    pub left_x: f64,
    pub top_y: f64,
    pub right_x: f64,
    pub bottom_y: f64,
}

impl QueryBox {
    pub fn new(left_x: f64, top_y: f64, right_x: f64, bottom_y: f64) -> Self {
        QueryBox {
            left_x,
            top_y,
            right_x,
            bottom_y,
        }
    }

    /// The four edges of the box as segments, clockwise from the top.
    fn edges(&self) -> [(Point, Point); 4] {
        let tl = Point::new(self.left_x, self.top_y);
        let tr = Point::new(self.right_x, self.top_y);
        let br = Point::new(self.right_x, self.bottom_y);
        let bl = Point::new(self.left_x, self.bottom_y);
        [(tl, tr), (tr, br), (br, bl), (bl, tl)]
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= self.left_x && p.x <= self.right_x && p.y >= self.top_y && p.y <= self.bottom_y
    }
}

/// Whether a shape's geometry intersects the query box.
///
/// Hidden shapes are the caller's concern; this function tests geometry only.
pub fn overlaps(shape: &Shape, query: &QueryBox) -> bool {
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
        } => boxes_overlap(*left_x, *top_y, *right_x, *bottom_y, query),
        Shape::Line { start, end, .. } => line_overlaps(*start, *end, query),
        Shape::Image {
            x,
            y,
            width,
            height,
            ..
        } => match (width, height) {
            (Some(w), Some(h)) => boxes_overlap(*x, *y, x + w, y + h, query),
            _ => false,
        },
        Shape::Text { .. } | Shape::Polygon { .. } => false,
    }
}

/// Bounding-box overlap: not overlapping only if strictly separated on an axis.
fn boxes_overlap(left_x: f64, top_y: f64, right_x: f64, bottom_y: f64, q: &QueryBox) -> bool {
    !(q.left_x > right_x || q.right_x < left_x || q.top_y > bottom_y || q.bottom_y < top_y)
}

fn line_overlaps(start: Point, end: Point, query: &QueryBox) -> bool {
    if query.contains(start) || query.contains(end) {
        return true;
    }
    query
        .edges()
        .iter()
        .any(|&(a, b)| segments_intersect(start, end, a, b))
}

/// Standard parametric two-segment intersection. Segments intersect iff both
/// parameters lie in [0, 1]. Parallel segments (zero denominator) never
/// intersect, including the collinear-overlap case.
fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let denominator = (b2.y - b1.y) * (a2.x - a1.x) - (b2.x - b1.x) * (a2.y - a1.y);
    if denominator == 0.0 {
        return false;
    }
    let ua = ((b2.x - b1.x) * (a1.y - b1.y) - (b2.y - b1.y) * (a1.x - b1.x)) / denominator;
    let ub = ((a2.x - a1.x) * (a1.y - b1.y) - (a2.y - a1.y) * (a1.x - b1.x)) / denominator;
    (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub)
}
