//! Composition of the annotated display frame.

use crate::compliance::ComplianceSnapshot;
use crate::constants::{
    DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH, RECORDING_DOT_CENTER, RECORDING_DOT_RADIUS,
};
use crate::pipeline::ClassifiedFace;
use crate::utils::image_conversion::is_usable_frame;
use crate::{Error, Result};
use opencv::core::{Mat, Point, Rect, Scalar, Size};
use opencv::imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;

const STATUS_TEXT_X: i32 = RECORDING_DOT_CENTER.0 + RECORDING_DOT_RADIUS + 15;

/// Box color for faces wearing a mask (BGR green)
pub fn compliant_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// Box color for faces without a mask (BGR red)
pub fn non_compliant_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

/// Label drawn next to a face
///
/// Compliant faces show the mask percentage, others show its complement.
#[must_use]
pub fn face_label(mask_percentage: u8, compliant: bool) -> String {
    if compliant {
        format!("{mask_percentage}%")
    } else {
        format!("{}%", 100 - mask_percentage.min(100))
    }
}

/// Centered crop rectangle for a zoom value
///
/// `zoom` is clamped to `[0, height]` and so that at least one column remains.
/// Width shrinks by `zoom`, height by `zoom` scaled with the frame aspect ratio.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn zoom_rect(frame_size: Size, zoom: i32) -> Rect {
    let (width, height) = (frame_size.width, frame_size.height);
    if width <= 0 || height <= 0 {
        return Rect::new(0, 0, width.max(0), height.max(0));
    }

    let zoom = zoom.clamp(0, height).min(width - 1);
    let crop_ratio = height as f32 / width as f32;

    let crop_width = width - zoom;
    let crop_height = (height - (zoom as f32 * crop_ratio) as i32).max(1);

    Rect::new((width - crop_width) / 2, (height - crop_height) / 2, crop_width, crop_height)
}

/// A rendered tick
pub struct RenderedFrame {
    /// Full-resolution BGR frame with boxes; what gets recorded
    pub annotated: Mat,
    /// Cropped, resized RGB frame for display
    pub display: Mat,
}

/// Draws face annotations and normalizes frames for output
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    output_size: Size,
    show_status: bool,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(Size::new(DEFAULT_OUTPUT_WIDTH, DEFAULT_OUTPUT_HEIGHT))
    }
}

impl OverlayRenderer {
    #[must_use]
    pub fn new(output_size: Size) -> Self {
        Self {
            output_size,
            show_status: false,
        }
    }

    /// Draw the compliance percentage and people count on the display frame
    #[must_use]
    pub fn with_status(mut self, show_status: bool) -> Self {
        self.show_status = show_status;
        self
    }

    pub fn output_size(&self) -> Size {
        self.output_size
    }

    /// Draw boxes and labels for every face onto `frame`
    ///
    /// # Errors
    ///
    /// Returns an error if drawing fails
    pub fn draw_faces(&self, frame: &mut Mat, faces: &[ClassifiedFace]) -> Result<()> {
        for face in faces {
            let color = if face.compliant {
                compliant_color()
            } else {
                non_compliant_color()
            };
            let region = &face.region;

            imgproc::rectangle_points(frame, region.top_left(), region.bottom_right(), color, 1, LINE_8, 0)?;

            let label = face_label(region.mask_percentage(), face.compliant);
            imgproc::put_text(
                frame,
                &label,
                region.bottom_right(),
                FONT_HERSHEY_SIMPLEX,
                1.0,
                color,
                1,
                LINE_8,
                false,
            )?;
        }
        Ok(())
    }

    /// Build the annotated and display frames for one tick
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a non-empty BGR image or any `OpenCV` call fails
    pub fn compose(
        &self,
        frame: &Mat,
        faces: &[ClassifiedFace],
        zoom: i32,
        recording: bool,
        status: Option<&ComplianceSnapshot>,
    ) -> Result<RenderedFrame> {
        if !is_usable_frame(frame) {
            return Err(Error::InvalidInput(format!(
                "Cannot render a {}x{} frame of type {}",
                frame.cols(),
                frame.rows(),
                frame.typ()
            )));
        }

        let mut annotated = frame.try_clone()?;
        self.draw_faces(&mut annotated, faces)?;

        let mut display = annotated.try_clone()?;
        if recording {
            imgproc::circle(
                &mut display,
                Point::new(RECORDING_DOT_CENTER.0, RECORDING_DOT_CENTER.1),
                RECORDING_DOT_RADIUS,
                non_compliant_color(),
                imgproc::FILLED,
                LINE_8,
                0,
            )?;
        }

        let roi = zoom_rect(display.size()?, zoom);
        let cropped = Mat::roi(&display, roi)?.try_clone()?;

        let mut resized = Mat::default();
        imgproc::resize(&cropped, &mut resized, self.output_size, 0.0, 0.0, imgproc::INTER_CUBIC)?;

        if self.show_status {
            if let Some(status) = status {
                Self::draw_status(&mut resized, status)?;
            }
        }

        let mut display = Mat::default();
        imgproc::cvt_color(&resized, &mut display, imgproc::COLOR_BGR2RGB, 0)?;

        Ok(RenderedFrame { annotated, display })
    }

    /// Status text in the top-left corner, right of the recording dot; green when healthy
    fn draw_status(frame: &mut Mat, status: &ComplianceSnapshot) -> Result<()> {
        let color = if status.is_healthy() {
            compliant_color()
        } else {
            non_compliant_color()
        };

        imgproc::put_text(
            frame,
            &format!("Compliance: {}%", status.percent()),
            Point::new(STATUS_TEXT_X, 30),
            FONT_HERSHEY_SIMPLEX,
            0.7,
            color,
            2,
            LINE_8,
            false,
        )?;
        imgproc::put_text(
            frame,
            &format!("People: {}", status.max_people),
            Point::new(STATUS_TEXT_X, 58),
            FONT_HERSHEY_SIMPLEX,
            0.7,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            LINE_8,
            false,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_label() {
        assert_eq!(face_label(80, true), "80%");
        assert_eq!(face_label(15, false), "85%");
        assert_eq!(face_label(0, false), "100%");
    }

    #[test]
    fn test_zoom_rect_identity() {
        assert_eq!(zoom_rect(Size::new(640, 480), 0), Rect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_zoom_rect_centered() {
        // 100 * 0.75 = 75 rows removed
        let roi = zoom_rect(Size::new(640, 480), 100);
        assert_eq!(roi, Rect::new(50, 37, 540, 405));
    }

    #[test]
    fn test_zoom_rect_clamped() {
        let max = zoom_rect(Size::new(640, 480), 480);
        assert_eq!(max, zoom_rect(Size::new(640, 480), 10_000));
        assert_eq!(max.width, 160);
        assert_eq!(zoom_rect(Size::new(640, 480), -20), Rect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_zoom_rect_stays_inside_frame() {
        for zoom in (0..=480).step_by(7) {
            let roi = zoom_rect(Size::new(640, 480), zoom);
            assert!(roi.x >= 0 && roi.y >= 0);
            assert!(roi.width > 0 && roi.height > 0);
            assert!(roi.x + roi.width <= 640);
            assert!(roi.y + roi.height <= 480);
        }
    }
}
