//! A single detected face, bound to its crop and to both coordinate spaces.

use crate::mask_detection::MaskClassifier;
use crate::utils::{clamp_box, safe_cast::probability_to_percent, scale_point};
use crate::Result;
use opencv::core::{Mat, Point, Rect};
use opencv::prelude::*;
use std::ops::Range;

/// A face found in one frame
///
/// Built fresh for every box on every tick and dropped after rendering.
pub struct FaceRegion {
    image: Mat,
    area: Rect,
    rows: Range<i32>,
    cols: Range<i32>,
    top_left: Point,
    bottom_right: Point,
    mask_probability: Option<f32>,
}

impl FaceRegion {
    /// Crop `area` out of the downscaled `frame`
    ///
    /// The box is clamped to the frame first. Returns `Ok(None)` when nothing of it lies
    /// inside the frame, so a stray detection is skipped instead of read out of bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the crop or the display projection fails
    pub fn new(frame: &Mat, area: Rect, upscale: f64) -> Result<Option<Self>> {
        let Some(area) = clamp_box(area, frame.cols(), frame.rows()) else {
            log::debug!("Skipping box {area:?} outside {}x{} frame", frame.cols(), frame.rows());
            return Ok(None);
        };

        let image = Mat::roi(frame, area)?.try_clone()?;

        let top_left = scale_point(area.x, area.y, upscale)?;
        let bottom_right = scale_point(area.x + area.width - 1, area.y + area.height - 1, upscale)?;

        Ok(Some(Self {
            image,
            area,
            rows: area.y..area.y + area.height,
            cols: area.x..area.x + area.width,
            top_left,
            bottom_right,
            mask_probability: None,
        }))
    }

    /// Run the classifier on the crop and remember the probability
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    pub fn classify_mask(&mut self, classifier: &MaskClassifier) -> Result<bool> {
        let probability = classifier.probability(&self.image)?;
        self.mask_probability = Some(probability);
        Ok(classifier.decide(probability))
    }

    /// Re-read the stored probability against the classifier's current threshold
    ///
    /// `None` until [`FaceRegion::classify_mask`] has succeeded.
    pub fn is_compliant(&self, classifier: &MaskClassifier) -> Option<bool> {
        self.mask_probability.map(|p| classifier.decide(p))
    }

    /// Mask probability as a whole percentage, truncated
    pub fn mask_percentage(&self) -> u8 {
        self.mask_probability.map_or(0, probability_to_percent)
    }

    pub fn mask_probability(&self) -> Option<f32> {
        self.mask_probability
    }

    /// Box in processing coordinates
    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn rows(&self) -> Range<i32> {
        self.rows.clone()
    }

    pub fn cols(&self) -> Range<i32> {
        self.cols.clone()
    }

    /// Top-left corner in display coordinates
    pub fn top_left(&self) -> Point {
        self.top_left
    }

    /// Bottom-right corner (inclusive) in display coordinates
    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    /// The cropped face
    pub fn image(&self) -> &Mat {
        &self.image
    }
}
