//! Conversions between OpenCV `Mat` frames and model-ready `ndarray` tensors.

use crate::constants::{MASK_INPUT_CHANNELS, PIXEL_NORMALIZATION_SCALE};
use crate::{Error, Result};
use ndarray::Array4;
use opencv::core::{Mat, Vec3b, CV_8UC3};
use opencv::prelude::*;

/// Whether a captured frame can be fed to the pipeline
///
/// Capture devices sometimes hand back empty or non-BGR buffers; those ticks are skipped.
#[must_use]
pub fn is_usable_frame(frame: &Mat) -> bool {
    !frame.empty() && frame.rows() > 0 && frame.cols() > 0 && frame.typ() == CV_8UC3
}

/// Flatten an 8-bit, 3-channel image into a `(1, height, width, 3)` tensor in `[0, 1]`
///
/// Channel order is preserved as captured.
///
/// # Errors
/// * Returns error if the Mat is empty or not `CV_8UC3`
/// * Returns error if pixel data cannot be accessed
#[allow(clippy::cast_sign_loss)] // Dimensions checked positive above
pub fn bgr_to_nhwc_tensor(mat: &Mat) -> Result<Array4<f32>> {
    if !is_usable_frame(mat) {
        return Err(Error::InvalidInput(format!(
            "Expected non-empty CV_8UC3 image, got {}x{} of type {}",
            mat.cols(),
            mat.rows(),
            mat.typ()
        )));
    }

    let rows = mat.rows();
    let cols = mat.cols();
    let mut data = Vec::with_capacity(rows as usize * cols as usize * MASK_INPUT_CHANNELS);

    for row in 0..rows {
        for col in 0..cols {
            let pixel = mat.at_2d::<Vec3b>(row, col)?;
            for ch in 0..MASK_INPUT_CHANNELS {
                data.push(f32::from(pixel[ch]) / PIXEL_NORMALIZATION_SCALE);
            }
        }
    }

    Array4::from_shape_vec((1, rows as usize, cols as usize, MASK_INPUT_CHANNELS), data)
        .map_err(|e| Error::ModelInputError(format!("Failed to create input tensor: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_32FC3, CV_8UC1};

    #[test]
    fn test_bgr_to_nhwc_tensor_shape_and_scale() {
        let mat = Mat::new_rows_cols_with_default(2, 3, CV_8UC3, Scalar::new(0.0, 51.0, 255.0, 0.0)).unwrap();

        let tensor = bgr_to_nhwc_tensor(&mat).unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert!((tensor[[0, 1, 2, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 2, 2]], 1.0);
    }

    #[test]
    fn test_tensor_values_in_unit_range() {
        let mat = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::new(17.0, 128.0, 254.0, 0.0)).unwrap();

        let tensor = bgr_to_nhwc_tensor(&mat).unwrap();
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let gray = Mat::new_rows_cols_with_default(4, 4, CV_8UC1, Scalar::all(0.0)).unwrap();
        assert!(bgr_to_nhwc_tensor(&gray).is_err());

        let float = Mat::new_rows_cols_with_default(4, 4, CV_32FC3, Scalar::all(0.0)).unwrap();
        assert!(bgr_to_nhwc_tensor(&float).is_err());

        assert!(bgr_to_nhwc_tensor(&Mat::default()).is_err());
    }

    #[test]
    fn test_is_usable_frame() {
        assert!(!is_usable_frame(&Mat::default()));
        let frame = Mat::new_rows_cols_with_default(8, 8, CV_8UC3, Scalar::all(0.0)).unwrap();
        assert!(is_usable_frame(&frame));
    }
}
