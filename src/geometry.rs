//! Axis-aligned rectangle math used by candidate detection.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Axis-aligned bounding box in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the two rectangles share a region of positive area.
    /// Merely touching edges does not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Grow the rectangle by `padding` on every side, clamped at the
    /// top-left image border.
    pub fn expand(&self, padding: u32) -> Rect {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        Rect {
            x,
            y,
            width: self.right() + padding - x,
            height: self.bottom() + padding - y,
        }
    }
}

/// A raw detection: a bounding box plus the area of the contour it came
/// from. Contour area, not box area, drives de-duplication priority.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub rect: Rect,
    pub contour_area: f64,
}

/// Drop detections whose (padded) boxes overlap an already-kept detection.
///
/// Detections are considered largest-contour first; ties keep the original
/// detection order. Padding merges visually-adjacent boxes that would
/// otherwise survive as near-duplicates.
pub fn deduplicate(detections: Vec<Detection>, padding: u32) -> Vec<Detection> {
    let mut sorted = detections;
    // Stable sort: equal areas retain detection order.
    sorted.sort_by(|a, b| {
        b.contour_area
            .partial_cmp(&a.contour_area)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for detection in sorted {
        let padded = detection.rect.expand(padding);
        let overlaps_kept = kept
            .iter()
            .any(|existing| padded.overlaps(&existing.rect.expand(padding)));
        if !overlaps_kept {
            kept.push(detection);
        }
    }
    kept
}
