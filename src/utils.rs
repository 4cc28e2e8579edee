//! Utility functions for box arithmetic and coordinate transformations.

pub mod image_conversion;
pub mod safe_cast;

use crate::Result;
use opencv::core::{Point, Rect};
use safe_cast::f64_round_to_i32;

/// Clamp a bounding box to an image of `max_width` x `max_height`.
///
/// Returns `None` when nothing of the box is left inside the image.
#[must_use]
pub fn clamp_box(bbox: Rect, max_width: i32, max_height: i32) -> Option<Rect> {
    if max_width <= 0 || max_height <= 0 || bbox.width <= 0 || bbox.height <= 0 {
        return None;
    }

    let x1 = bbox.x.clamp(0, max_width);
    let y1 = bbox.y.clamp(0, max_height);
    let x2 = bbox.x.saturating_add(bbox.width).clamp(0, max_width);
    let y2 = bbox.y.saturating_add(bbox.height).clamp(0, max_height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}

/// Project a processing-scale point into display scale
///
/// # Errors
///
/// Returns an error if the scaled coordinate does not fit in an `i32`
pub fn scale_point(x: i32, y: i32, factor: f64) -> Result<Point> {
    Ok(Point::new(
        f64_round_to_i32(f64::from(x) * factor)?,
        f64_round_to_i32(f64::from(y) * factor)?,
    ))
}
