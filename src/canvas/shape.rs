//! Shape representation for the drawing surface
//!
//! This module defines the [`Shape`] enum, a closed tagged variant with one
//! case per drawable kind. Unlike the duck-typed records of a scripting
//! runtime, every kind carries exactly the fields that apply to it, and all
//! dispatch happens by pattern match.
//!
//! # Shape Kinds
//!
//! - [`Shape::Rect`]: axis-aligned box given by two corners
//! - [`Shape::Oval`]: ellipse inscribed in an axis-aligned bounding box
//! - [`Shape::Line`]: segment between two endpoints
//! - [`Shape::Text`]: anchored text with font styling
//! - [`Shape::Image`]: positioned image, optionally with explicit dimensions
//! - [`Shape::Polygon`]: closed path over a vertex list
//!
//! Colors are plain strings ("black", "TRANSPARENT", "#ff0000", ...) exactly
//! as the guest supplies them; the core never parses them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque shape identifier, unique within one [`Canvas`](super::Canvas).
///
/// Ids are allocated monotonically and never reused within a session.
/// Serializes through its `shape_{n}` display form so snapshot maps keyed
/// by id stay representable in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub(crate) u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape_{}", self.0)
    }
}

impl Serialize for ShapeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.strip_prefix("shape_").unwrap_or(&text);
        digits
            .parse::<u64>()
            .map(ShapeId)
            .map_err(|_| serde::de::Error::custom(format!("invalid shape id '{text}'")))
    }
}

/// A point on the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Where text hangs relative to its position, tk-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Anchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
    #[default]
    Center,
}

/// Horizontal text alignment derived from an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical text baseline derived from an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

impl Anchor {
    /// Parse a tk anchor string ("nw", "CENTER", ...). Unknown strings fall
    /// back to `Center`, matching the original library.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "N" => Anchor::N,
            "NE" => Anchor::Ne,
            "E" => Anchor::E,
            "SE" => Anchor::Se,
            "S" => Anchor::S,
            "SW" => Anchor::Sw,
            "W" => Anchor::W,
            "NW" => Anchor::Nw,
            _ => Anchor::Center,
        }
    }

    /// Map the anchor to canvas-style alignment.
    pub fn alignment(self) -> (HAlign, VAlign) {
        match self {
            Anchor::N => (HAlign::Center, VAlign::Top),
            Anchor::Ne => (HAlign::Right, VAlign::Top),
            Anchor::E => (HAlign::Right, VAlign::Middle),
            Anchor::Se => (HAlign::Right, VAlign::Bottom),
            Anchor::S => (HAlign::Center, VAlign::Bottom),
            Anchor::Sw => (HAlign::Left, VAlign::Bottom),
            Anchor::W => (HAlign::Left, VAlign::Middle),
            Anchor::Nw => (HAlign::Left, VAlign::Top),
            Anchor::Center => (HAlign::Center, VAlign::Middle),
        }
    }
}

/// A drawing-surface entity.
///
/// Shapes are owned exclusively by the [`Canvas`](super::Canvas); the renderer
/// and hit-tester only read them. Every kind carries a `hidden` flag; hidden
/// shapes are neither painted nor hit-tested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rect {
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: String,
        outline: String,
        hidden: bool,
    },
    Oval {
        left_x: f64,
        top_y: f64,
        right_x: f64,
        bottom_y: f64,
        color: String,
        outline: String,
        hidden: bool,
    },
    Line {
        start: Point,
        end: Point,
        color: String,
        hidden: bool,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        anchor: Anchor,
        color: String,
        size: String,
        font: String,
        hidden: bool,
    },
    Image {
        x: f64,
        y: f64,
        url: String,
        width: Option<f64>,
        height: Option<f64>,
        hidden: bool,
    },
    Polygon {
        /// Flat list of vertices: x0, y0, x1, y1, ...
        coordinates: Vec<f64>,
        color: String,
        outline: String,
        hidden: bool,
    },
}

impl Shape {
    /// Whether the shape is currently hidden.
    pub fn is_hidden(&self) -> bool {
        match self {
            Shape::Rect { hidden, .. }
            | Shape::Oval { hidden, .. }
            | Shape::Line { hidden, .. }
            | Shape::Text { hidden, .. }
            | Shape::Image { hidden, .. }
            | Shape::Polygon { hidden, .. } => *hidden,
        }
    }

    pub(crate) fn set_hidden(&mut self, flag: bool) {
        match self {
            Shape::Rect { hidden, .. }
            | Shape::Oval { hidden, .. }
            | Shape::Line { hidden, .. }
            | Shape::Text { hidden, .. }
            | Shape::Image { hidden, .. }
            | Shape::Polygon { hidden, .. } => *hidden = flag,
        }
    }

    /// The fill color, where the kind has one (images do not).
    pub fn color(&self) -> Option<&str> {
        match self {
            Shape::Rect { color, .. }
            | Shape::Oval { color, .. }
            | Shape::Line { color, .. }
            | Shape::Text { color, .. }
            | Shape::Polygon { color, .. } => Some(color),
            Shape::Image { .. } => None,
        }
    }

    pub(crate) fn set_color(&mut self, new: &str) {
        match self {
            Shape::Rect { color, .. }
            | Shape::Oval { color, .. }
            | Shape::Line { color, .. }
            | Shape::Text { color, .. }
            | Shape::Polygon { color, .. } => *color = new.to_string(),
            Shape::Image { .. } => {}
        }
    }

    pub(crate) fn set_outline(&mut self, new: &str) {
        match self {
            Shape::Rect { outline, .. }
            | Shape::Oval { outline, .. }
            | Shape::Polygon { outline, .. } => *outline = new.to_string(),
            Shape::Line { .. } | Shape::Text { .. } | Shape::Image { .. } => {}
        }
    }

    /// Leftmost x coordinate, per kind. Lines use the lesser endpoint.
    pub fn left_x(&self) -> Option<f64> {
        match self {
            Shape::Text { x, .. } | Shape::Image { x, .. } => Some(*x),
            Shape::Rect { left_x, .. } | Shape::Oval { left_x, .. } => Some(*left_x),
            Shape::Line { start, end, .. } => Some(start.x.min(end.x)),
            Shape::Polygon { .. } => None,
        }
    }

    /// Topmost y coordinate, per kind. Lines use the lesser endpoint.
    pub fn top_y(&self) -> Option<f64> {
        match self {
            Shape::Text { y, .. } | Shape::Image { y, .. } => Some(*y),
            Shape::Rect { top_y, .. } | Shape::Oval { top_y, .. } => Some(*top_y),
            Shape::Line { start, end, .. } => Some(start.y.min(end.y)),
            Shape::Polygon { .. } => None,
        }
    }

    /// Width of the shape's extent, where defined. Images only report a
    /// width if one was given explicitly at creation.
    pub fn width(&self) -> Option<f64> {
        match self {
            Shape::Image { width, .. } => *width,
            Shape::Rect {
                left_x, right_x, ..
            }
            | Shape::Oval {
                left_x, right_x, ..
            } => Some(right_x - left_x),
            Shape::Line { start, end, .. } => Some(start.x.max(end.x) - start.x.min(end.x)),
            Shape::Text { .. } | Shape::Polygon { .. } => None,
        }
    }

    /// Height of the shape's extent, where defined. Images only report a
    /// height if one was given explicitly at creation.
    pub fn height(&self) -> Option<f64> {
        match self {
            Shape::Image { height, .. } => *height,
            Shape::Rect {
                top_y, bottom_y, ..
            }
            | Shape::Oval {
                top_y, bottom_y, ..
            } => Some(bottom_y - top_y),
            Shape::Line { start, end, .. } => Some(start.y.max(end.y) - start.y.min(end.y)),
            Shape::Text { .. } | Shape::Polygon { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_parse_is_case_insensitive_and_defaults_to_center() {
        assert_eq!(Anchor::parse("nw"), Anchor::Nw);
        assert_eq!(Anchor::parse("NE"), Anchor::Ne);
        assert_eq!(Anchor::parse("bogus"), Anchor::Center);
        assert_eq!(Anchor::parse(""), Anchor::Center);
    }

    #[test]
    fn anchor_alignment_matches_tk_mapping() {
        assert_eq!(Anchor::Nw.alignment(), (HAlign::Left, VAlign::Top));
        assert_eq!(Anchor::S.alignment(), (HAlign::Center, VAlign::Bottom));
        assert_eq!(Anchor::Center.alignment(), (HAlign::Center, VAlign::Middle));
    }

    #[test]
    fn shape_id_displays_with_prefix() {
        assert_eq!(ShapeId(7).to_string(), "shape_7");
    }

    #[test]
    fn shape_id_serializes_as_its_display_form() {
        let json = serde_json::to_string(&ShapeId(7)).unwrap();
        assert_eq!(json, "\"shape_7\"");
        let back: ShapeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ShapeId(7));
    }

    #[test]
    fn line_extent_uses_lesser_endpoint() {
        let line = Shape::Line {
            start: Point::new(10.0, 4.0),
            end: Point::new(2.0, 9.0),
            color: "black".to_string(),
            hidden: false,
        };
        assert_eq!(line.left_x(), Some(2.0));
        assert_eq!(line.top_y(), Some(4.0));
        assert_eq!(line.width(), Some(8.0));
        assert_eq!(line.height(), Some(5.0));
    }
}
