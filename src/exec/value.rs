//! Guest-visible runtime values
//!
//! Guest locals are tagged values rather than raw strings, so shape handles
//! and numbers keep their identity inside the VM while still rendering as
//! the printable form the step history stores.

use crate::canvas::shape::ShapeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value held in a guest local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuestValue {
    Num(f64),
    Str(String),
    Shape(ShapeId),
}

impl GuestValue {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            GuestValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<ShapeId> {
        match self {
            GuestValue::Shape(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without a trailing ".0", the way the
            // guest language prints them.
            GuestValue::Num(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            GuestValue::Num(n) => write!(f, "{}", n),
            GuestValue::Str(s) => write!(f, "{}", s),
            GuestValue::Shape(id) => write!(f, "{}", id),
        }
    }
}
