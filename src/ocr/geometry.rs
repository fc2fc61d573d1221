//! Page-space geometry shared by OCR tokens and layout regions.

use serde::{Deserialize, Serialize};

/// A recognised text polygon: a list of `[x, y]` points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<[f32; 2]>);

impl Polygon {
    pub fn from_rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self(vec![[x1, y1], [x2, y1], [x2, y2], [x1, y2]])
    }

    /// Axis-aligned bounds of the polygon. An empty polygon collapses to the origin.
    pub fn bbox(&self) -> BBox {
        if self.0.is_empty() {
            return BBox::default();
        }
        let mut b = BBox {
            x1: f32::INFINITY,
            y1: f32::INFINITY,
            x2: f32::NEG_INFINITY,
            y2: f32::NEG_INFINITY,
        };
        for [x, y] in &self.0 {
            b.x1 = b.x1.min(*x);
            b.y1 = b.y1.min(*y);
            b.x2 = b.x2.max(*x);
            b.y2 = b.y2.max(*y);
        }
        b
    }
}

/// Axis-aligned box, y growing downwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Any overlap counts, including touching edges.
    pub fn intersects(&self, other: &BBox) -> bool {
        !(self.x2 < other.x1 || self.x1 > other.x2 || self.y2 < other.y1 || self.y1 > other.y2)
    }

    /// Width of the shared horizontal span (0 when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f32 {
        (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0)
    }
}
