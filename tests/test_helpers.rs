//! Helper functions and fakes shared by the integration tests
#![allow(dead_code)]

use mask_compliance_monitor::{
    face_detection::FaceLocator,
    mask_detection::{MaskClassifier, MaskModel},
    Error, Result,
};
use ndarray::Array4;
use opencv::{
    core::{Mat, Rect, Scalar, CV_8UC3},
    prelude::*,
};
use std::collections::VecDeque;

/// Create a test image with specified dimensions and type
pub fn create_test_image(height: i32, width: i32, cv_type: i32) -> Result<Mat> {
    Mat::zeros(height, width, cv_type)?.to_mat().map_err(Into::into)
}

/// Create a BGR frame filled with one color
pub fn create_filled_frame(height: i32, width: i32, bgr: (f64, f64, f64)) -> Result<Mat> {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::new(bgr.0, bgr.1, bgr.2, 0.0))
        .map_err(Into::into)
}

/// Read one BGR pixel
pub fn pixel(frame: &Mat, x: i32, y: i32) -> Result<(u8, u8, u8)> {
    let value = frame.at_2d::<opencv::core::Vec3b>(y, x)?;
    Ok((value[0], value[1], value[2]))
}

/// Locator that returns the same downscaled boxes for every frame
pub struct FixedBoxLocator {
    pub boxes: Vec<Rect>,
    pub scale: f64,
}

impl FixedBoxLocator {
    pub fn new(boxes: Vec<Rect>) -> Self {
        Self { boxes, scale: 4.0 }
    }
}

impl FaceLocator for FixedBoxLocator {
    fn detect(&mut self, _image: &Mat) -> Result<Vec<Rect>> {
        Ok(self.boxes.clone())
    }

    fn scale(&self) -> f64 {
        self.scale
    }
}

/// Locator that plays back one box list per frame, then nothing
pub struct ScriptedLocator {
    pub frames: VecDeque<Vec<Rect>>,
}

impl ScriptedLocator {
    pub fn new(frames: Vec<Vec<Rect>>) -> Self {
        Self { frames: frames.into() }
    }
}

impl FaceLocator for ScriptedLocator {
    fn detect(&mut self, _image: &Mat) -> Result<Vec<Rect>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }

    fn scale(&self) -> f64 {
        4.0
    }
}

/// Locator whose detector always fails
pub struct FailingLocator;

impl FaceLocator for FailingLocator {
    fn detect(&mut self, _image: &Mat) -> Result<Vec<Rect>> {
        Err(Error::ModelError("cascade exploded".to_string()))
    }

    fn scale(&self) -> f64 {
        4.0
    }
}

/// Model that reports a fixed mask probability
pub struct FixedModel(pub f32);

impl MaskModel for FixedModel {
    fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        Ok(vec![1.0 - self.0, self.0])
    }
}

/// Model whose inference always fails
pub struct FailingModel;

impl MaskModel for FailingModel {
    fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        Err(Error::ModelError("inference failed".to_string()))
    }
}

/// Inline classifier around a fixed probability
pub fn fixed_classifier(probability: f32) -> MaskClassifier {
    MaskClassifier::new(Box::new(FixedModel(probability)))
}
