use crate::constants::{
    CASCADE_MIN_FACE_SIZE, CASCADE_MIN_NEIGHBORS, CASCADE_SCALE_FACTOR, DEFAULT_DOWNSCALE_FACTOR,
};
use crate::utils::{clamp_box, safe_cast::f64_round_to_i32};
use crate::{Error, Result};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;

/// Cascade search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    /// Factor the frame is shrunk by before searching
    pub downscale_factor: f64,
    /// Pyramid step between search scales
    pub scale_factor: f64,
    /// Neighbouring hits a candidate needs to be kept
    pub min_neighbors: i32,
    /// Smallest face window in downscaled pixels
    pub min_face_size: i32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            scale_factor: CASCADE_SCALE_FACTOR,
            min_neighbors: CASCADE_MIN_NEIGHBORS,
            min_face_size: CASCADE_MIN_FACE_SIZE,
        }
    }
}

/// Something that finds faces in a frame.
///
/// Boxes come back in the *downscaled* space: multiply by [`FaceLocator::scale`] to
/// reach display coordinates.
pub trait FaceLocator {
    /// Locate faces in a full-resolution BGR frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or the detector itself fails
    fn detect(&mut self, image: &Mat) -> Result<Vec<Rect>>;

    /// Factor between processing and display coordinates
    fn scale(&self) -> f64;

    /// Shrink a frame into the processing space the boxes refer to
    ///
    /// # Errors
    ///
    /// Returns an error if the resize fails
    fn downscale(&self, image: &Mat) -> Result<Mat> {
        downscale(image, self.scale())
    }
}

/// Shrink `image` by `factor` along both axes
///
/// An empty input yields an empty output.
///
/// # Errors
///
/// Returns an error if the factor is not positive or the resize fails
pub fn downscale(image: &Mat, factor: f64) -> Result<Mat> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(Error::InvalidInput(format!("Downscale factor must be positive, got {factor}")));
    }
    if image.empty() {
        return Ok(Mat::default());
    }

    let width = f64_round_to_i32((f64::from(image.cols()) / factor).floor())?.max(1);
    let height = f64_round_to_i32((f64::from(image.rows()) / factor).floor())?.max(1);

    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;
    Ok(resized)
}

/// Haar cascade face locator backed by `OpenCV`
pub struct CascadeFaceLocator {
    classifier: CascadeClassifier,
    params: CascadeParams,
}

impl CascadeFaceLocator {
    /// Load a cascade from an `OpenCV` XML model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The cascade file does not exist or cannot be parsed
    /// - The parameters are out of range
    pub fn new<P: AsRef<Path>>(model_path: P, params: CascadeParams) -> Result<Self> {
        let model_path = model_path.as_ref();
        log::info!("Loading face cascade: {}", model_path.display());

        if !model_path.exists() {
            return Err(Error::ModelError(format!(
                "Face cascade not found: {}",
                model_path.display()
            )));
        }
        if params.scale_factor <= 1.0 {
            return Err(Error::InvalidInput(format!(
                "Cascade scale factor must be greater than 1.0, got {}",
                params.scale_factor
            )));
        }
        if params.downscale_factor <= 0.0 || params.min_face_size <= 0 || params.min_neighbors < 0 {
            return Err(Error::InvalidInput("Cascade parameters must be positive".to_string()));
        }

        let path_str = model_path
            .to_str()
            .ok_or_else(|| Error::ModelError(format!("Cascade path is not UTF-8: {}", model_path.display())))?;
        let classifier = CascadeClassifier::new(path_str)?;

        // OpenCV reports parse failures as an empty classifier rather than an error
        if classifier.empty()? {
            return Err(Error::ModelError(format!(
                "Face cascade could not be loaded: {}",
                model_path.display()
            )));
        }

        Ok(Self { classifier, params })
    }

    /// Search parameters in use
    #[must_use]
    pub fn params(&self) -> CascadeParams {
        self.params
    }

    /// Downscale and grayscale a BGR frame for the cascade
    fn preprocess(&self, image: &Mat) -> Result<Mat> {
        let resized = downscale(image, self.params.downscale_factor)?;

        let mut grayscale = Mat::default();
        imgproc::cvt_color(&resized, &mut grayscale, imgproc::COLOR_BGR2GRAY, 0)?;
        Ok(grayscale)
    }
}

impl FaceLocator for CascadeFaceLocator {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Rect>> {
        if image.empty() {
            return Ok(Vec::new());
        }

        let grayscale = self.preprocess(image)?;
        let min_size = Size::new(self.params.min_face_size, self.params.min_face_size);

        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &grayscale,
            &mut faces,
            self.params.scale_factor,
            self.params.min_neighbors,
            0,
            min_size,
            Size::default(),
        )?;

        let (width, height) = (grayscale.cols(), grayscale.rows());
        let boxes: Vec<Rect> = faces
            .iter()
            .filter_map(|bbox| clamp_box(bbox, width, height))
            .collect();

        log::debug!("Cascade found {} face(s) in {}x{} frame", boxes.len(), width, height);
        Ok(boxes)
    }

    fn scale(&self) -> f64 {
        self.params.downscale_factor
    }
}
