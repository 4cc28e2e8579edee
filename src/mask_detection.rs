//! Mask classification using `ONNX` Runtime.
//!
//! The classifier is built once at startup and shared by reference. Its sensitivity can be
//! changed at any time and only affects how probabilities are interpreted, so no crop ever
//! needs to be re-inferred after a threshold change.

use crate::constants::{
    DEFAULT_SENSITIVITY, MASK_CLASS_INDEX, MASK_INPUT_SIZE, SENSITIVITY_MAX, SENSITIVITY_MIN,
};
use crate::utils::image_conversion::bgr_to_nhwc_tensor;
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A model mapping a `(1, H, W, 3)` tensor to a class distribution
pub trait MaskModel: Send {
    /// Run one forward pass
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>>;
}

/// Mask classifier model loaded through `ONNX` Runtime
pub struct OnnxMaskModel {
    session: Session,
}

impl OnnxMaskModel {
    /// Load the mask model from an `ONNX` file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading mask model: {}", model_path.as_ref().display());
        if !model_path.as_ref().exists() {
            return Err(Error::ModelError(format!(
                "Mask model not found: {}",
                model_path.as_ref().display()
            )));
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("mask_classifier")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelInputError("Model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Model has no outputs".to_string()));
        }

        Ok(Self { session })
    }
}

impl MaskModel for OnnxMaskModel {
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.view().into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let tensor = output.try_extract::<f32>()?;
        let view = tensor.view();
        Ok(view.iter().copied().collect())
    }
}

struct InferenceRequest {
    input: Array4<f32>,
    reply: Sender<std::result::Result<Vec<f32>, String>>,
}

/// Runs a model on a dedicated thread so a hung call surfaces as a timeout
///
/// At most one request is in flight. While the model is still busy with a request the
/// caller gave up on, new requests fail immediately instead of waiting out the timeout.
struct InferenceWorker {
    requests: Option<Sender<InferenceRequest>>,
    timeout: Duration,
    pending: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    fn spawn(model: Box<dyn MaskModel>, timeout: Duration) -> Result<Self> {
        let (tx, rx): (Sender<InferenceRequest>, Receiver<InferenceRequest>) = bounded(1);
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        let handle = thread::Builder::new()
            .name("mask-inference".to_string())
            .spawn(move || {
                for request in rx {
                    let result = model.predict(&request.input).map_err(|e| e.to_string());
                    worker_pending.fetch_sub(1, Ordering::AcqRel);
                    // Caller may have given up already
                    let _ = request.reply.send(result);
                }
            })?;

        Ok(Self {
            requests: Some(tx),
            timeout,
            pending,
            handle: Some(handle),
        })
    }

    fn is_busy(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    #[allow(clippy::cast_possible_truncation)] // Timeouts are far below u64::MAX ms
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| Error::ModelError("Inference worker stopped".to_string()))?;

        if self.is_busy() {
            return Err(Error::ModelError(
                "Inference worker still busy with a timed out request".to_string(),
            ));
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = requests.try_send(InferenceRequest { input, reply: reply_tx }) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(match e {
                TrySendError::Full(_) => {
                    Error::ModelError("Inference worker queue is full".to_string())
                }
                TrySendError::Disconnected(_) => {
                    Error::ModelError("Inference worker exited".to_string())
                }
            });
        }

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result.map_err(Error::ModelError),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Mask inference exceeded {timeout_ms} ms");
                Err(Error::Timeout(timeout_ms))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::ModelError("Inference worker exited".to_string()))
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if self.is_busy() {
                // Stuck inside the model; joining would block shutdown
                log::warn!("Inference worker still running, leaving it detached");
            } else if handle.join().is_err() {
                log::warn!("Inference worker panicked");
            }
        }
    }
}

enum Backend {
    Inline(Box<dyn MaskModel>),
    Worker(InferenceWorker),
}

/// Shared mask classification service with a runtime-adjustable sensitivity
pub struct MaskClassifier {
    backend: Backend,
    sensitivity: AtomicU32,
    input_size: i32,
}

impl MaskClassifier {
    /// Wrap a model, running inference on the calling thread
    #[must_use]
    pub fn new(model: Box<dyn MaskModel>) -> Self {
        Self {
            backend: Backend::Inline(model),
            sensitivity: AtomicU32::new(DEFAULT_SENSITIVITY.to_bits()),
            input_size: MASK_INPUT_SIZE,
        }
    }

    /// Wrap a model, running inference on a worker thread bounded by `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned
    pub fn with_timeout(model: Box<dyn MaskModel>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            backend: Backend::Worker(InferenceWorker::spawn(model, timeout)?),
            sensitivity: AtomicU32::new(DEFAULT_SENSITIVITY.to_bits()),
            input_size: MASK_INPUT_SIZE,
        })
    }

    /// Load the `ONNX` model and build a classifier around it
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or the worker cannot start
    pub fn from_onnx<P: AsRef<Path>>(model_path: P, timeout: Option<Duration>) -> Result<Self> {
        let model = Box::new(OnnxMaskModel::new(model_path)?);
        match timeout {
            Some(timeout) => Self::with_timeout(model, timeout),
            None => Ok(Self::new(model)),
        }
    }

    /// Override the square input resolution the model expects
    #[must_use]
    pub fn with_input_size(mut self, input_size: i32) -> Self {
        self.input_size = input_size;
        self
    }

    /// Current sensitivity threshold
    pub fn sensitivity(&self) -> f32 {
        f32::from_bits(self.sensitivity.load(Ordering::Acquire))
    }

    /// Set the sensitivity threshold; takes effect on the next decision
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside `(0, 1)`
    pub fn set_sensitivity(&self, sensitivity: f32) -> Result<()> {
        if !(sensitivity > 0.0 && sensitivity < 1.0) {
            return Err(Error::InvalidInput(format!(
                "Sensitivity must be within (0, 1), got {sensitivity}"
            )));
        }
        self.sensitivity.store(sensitivity.to_bits(), Ordering::Release);
        log::info!("Mask sensitivity set to {sensitivity:.2}");
        Ok(())
    }

    /// Nudge the sensitivity by `delta`, clamped to the control range and two decimals
    ///
    /// Returns the new value.
    pub fn adjust_sensitivity(&self, delta: f32) -> f32 {
        let next = ((self.sensitivity() + delta) * 100.0).round() / 100.0;
        let next = next.clamp(SENSITIVITY_MIN, SENSITIVITY_MAX);
        self.sensitivity.store(next.to_bits(), Ordering::Release);
        log::info!("Mask sensitivity set to {next:.2}");
        next
    }

    /// Interpret a probability against the live threshold
    pub fn decide(&self, probability: f32) -> bool {
        probability > self.sensitivity()
    }

    /// Probability in `[0, 1]` that the face crop wears a mask
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The crop is empty or not a BGR image
    /// - Inference fails or times out
    /// - The model output is too short or not finite
    pub fn probability(&self, face_image: &Mat) -> Result<f32> {
        let input = self.preprocess(face_image)?;

        let distribution = match &self.backend {
            Backend::Inline(model) => model.predict(&input)?,
            Backend::Worker(worker) => worker.predict(input)?,
        };

        let probability = *distribution.get(MASK_CLASS_INDEX).ok_or_else(|| {
            Error::ModelOutputError(format!(
                "Expected at least {} classes, got {}",
                MASK_CLASS_INDEX + 1,
                distribution.len()
            ))
        })?;

        if !probability.is_finite() {
            return Err(Error::ModelOutputError(format!("Non-finite probability {probability}")));
        }
        Ok(probability.clamp(0.0, 1.0))
    }

    /// Whether the face crop is classified as wearing a mask
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails
    pub fn is_compliant(&self, face_image: &Mat) -> Result<bool> {
        Ok(self.decide(self.probability(face_image)?))
    }

    /// Resize a crop to the model resolution and flatten it
    fn preprocess(&self, face_image: &Mat) -> Result<Array4<f32>> {
        if face_image.empty() {
            return Err(Error::InvalidInput("Empty face crop".to_string()));
        }

        let mut resized = Mat::default();
        imgproc::resize(
            face_image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        bgr_to_nhwc_tensor(&resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Instant;

    struct FixedModel(Vec<f32>);

    impl MaskModel for FixedModel {
        fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct ShapeRecorder(Arc<Mutex<Vec<usize>>>);

    impl MaskModel for ShapeRecorder {
        fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
            *self.0.lock().unwrap() = input.shape().to_vec();
            Ok(vec![0.5, 0.5])
        }
    }

    struct StuckModel;

    impl MaskModel for StuckModel {
        fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
            thread::sleep(Duration::from_millis(500));
            Ok(vec![0.0, 1.0])
        }
    }

    /// Hangs on the first call only
    struct SlowOnceModel(AtomicBool);

    impl MaskModel for SlowOnceModel {
        fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
            if self.0.swap(false, Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(500));
            }
            Ok(vec![0.0, 1.0])
        }
    }

    /// Raises its flag when dropped, which only happens on the worker thread
    struct DropFlagModel(Arc<AtomicBool>);

    impl MaskModel for DropFlagModel {
        fn predict(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
            Ok(vec![0.5, 0.5])
        }
    }

    impl Drop for DropFlagModel {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn crop() -> Mat {
        Mat::new_rows_cols_with_default(40, 30, CV_8UC3, Scalar::all(90.0)).unwrap()
    }

    #[test]
    fn test_default_sensitivity() {
        let classifier = MaskClassifier::new(Box::new(FixedModel(vec![0.2, 0.8])));
        assert_eq!(classifier.sensitivity(), 0.2);
    }

    #[test]
    fn test_probability_uses_second_class() {
        let classifier = MaskClassifier::new(Box::new(FixedModel(vec![0.2, 0.8])));
        assert_eq!(classifier.probability(&crop()).unwrap(), 0.8);
        assert!(classifier.is_compliant(&crop()).unwrap());
    }

    #[test]
    fn test_input_resized_to_model_resolution() {
        let shape = Arc::new(Mutex::new(Vec::new()));
        let classifier = MaskClassifier::new(Box::new(ShapeRecorder(Arc::clone(&shape))));
        classifier.probability(&crop()).unwrap();
        assert_eq!(*shape.lock().unwrap(), vec![1, 150, 150, 3]);
    }

    #[test]
    fn test_output_clamped_and_validated() {
        let over = MaskClassifier::new(Box::new(FixedModel(vec![0.0, 1.3])));
        assert_eq!(over.probability(&crop()).unwrap(), 1.0);

        let short = MaskClassifier::new(Box::new(FixedModel(vec![0.7])));
        assert!(matches!(short.probability(&crop()), Err(Error::ModelOutputError(_))));

        let nan = MaskClassifier::new(Box::new(FixedModel(vec![0.0, f32::NAN])));
        assert!(nan.probability(&crop()).is_err());
    }

    #[test]
    fn test_set_sensitivity_bounds() {
        let classifier = MaskClassifier::new(Box::new(FixedModel(vec![0.5, 0.5])));
        assert!(classifier.set_sensitivity(0.0).is_err());
        assert!(classifier.set_sensitivity(1.0).is_err());
        assert!(classifier.set_sensitivity(f32::NAN).is_err());
        classifier.set_sensitivity(0.6).unwrap();
        assert_eq!(classifier.sensitivity(), 0.6);
    }

    #[test]
    fn test_adjust_sensitivity_clamps() {
        let classifier = MaskClassifier::new(Box::new(FixedModel(vec![0.5, 0.5])));
        assert!((classifier.adjust_sensitivity(0.05) - 0.25).abs() < 1e-6);
        for _ in 0..40 {
            classifier.adjust_sensitivity(0.05);
        }
        assert_eq!(classifier.sensitivity(), SENSITIVITY_MAX);
        for _ in 0..40 {
            classifier.adjust_sensitivity(-0.05);
        }
        assert_eq!(classifier.sensitivity(), SENSITIVITY_MIN);
    }

    #[test]
    fn test_worker_returns_result() {
        let classifier =
            MaskClassifier::with_timeout(Box::new(FixedModel(vec![0.1, 0.9])), Duration::from_secs(5)).unwrap();
        assert_eq!(classifier.probability(&crop()).unwrap(), 0.9);
    }

    #[test]
    fn test_worker_times_out() {
        let classifier = MaskClassifier::with_timeout(Box::new(StuckModel), Duration::from_millis(50)).unwrap();
        assert!(matches!(classifier.probability(&crop()), Err(Error::Timeout(50))));
    }

    #[test]
    fn test_busy_worker_fails_fast() {
        let timeout = Duration::from_millis(200);
        let classifier = MaskClassifier::with_timeout(Box::new(StuckModel), timeout).unwrap();
        assert!(matches!(classifier.probability(&crop()), Err(Error::Timeout(200))));

        // The model is still sleeping on the first request
        let start = Instant::now();
        assert!(matches!(classifier.probability(&crop()), Err(Error::ModelError(_))));
        assert!(start.elapsed() < timeout);
    }

    #[test]
    fn test_worker_recovers_after_busy_request() {
        let classifier =
            MaskClassifier::with_timeout(Box::new(SlowOnceModel(AtomicBool::new(true))), Duration::from_millis(50))
                .unwrap();
        assert!(matches!(classifier.probability(&crop()), Err(Error::Timeout(50))));

        thread::sleep(Duration::from_millis(700));
        assert_eq!(classifier.probability(&crop()).unwrap(), 1.0);
    }

    #[test]
    fn test_idle_worker_joined_on_drop() {
        let dropped = Arc::new(AtomicBool::new(false));
        let classifier = MaskClassifier::with_timeout(
            Box::new(DropFlagModel(Arc::clone(&dropped))),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(classifier.probability(&crop()).unwrap(), 0.5);

        drop(classifier);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_crop_rejected() {
        let classifier = MaskClassifier::new(Box::new(FixedModel(vec![0.5, 0.5])));
        assert!(classifier.probability(&Mat::default()).is_err());
    }
}
