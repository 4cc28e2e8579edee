//! Configuration management for the mask compliance monitor

use crate::constants::{
    CASCADE_MIN_FACE_SIZE, CASCADE_MIN_NEIGHBORS, CASCADE_SCALE_FACTOR, DEFAULT_DOWNSCALE_FACTOR,
    DEFAULT_OUTPUT_HEIGHT, DEFAULT_OUTPUT_WIDTH, DEFAULT_RECORDING_FPS, DEFAULT_SENSITIVITY,
    DEFAULT_TICK_INTERVAL_MS, DEFAULT_ZOOM_STEP, MASK_INPUT_SIZE,
};
use crate::face_detection::CascadeParams;
use crate::{Error, Result};
use opencv::core::Size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model file locations
    pub models: ModelConfig,

    /// Face detection parameters
    pub detection: DetectionConfig,

    /// Mask classifier parameters
    pub classifier: ClassifierConfig,

    /// Display configuration
    pub display: DisplayConfig,

    /// Where reports and recordings go
    pub output: OutputConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Haar cascade XML for frontal faces
    pub face_cascade: PathBuf,

    /// Mask classifier ONNX model
    pub mask_classifier: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Factor frames are shrunk by before the cascade runs
    pub downscale_factor: f64,

    /// Cascade pyramid step
    pub scale_factor: f64,

    /// Neighbouring hits required per face
    pub min_neighbors: i32,

    /// Minimum face side in downscaled pixels
    pub min_face_size: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Initial mask probability threshold (0.0-1.0, exclusive)
    pub sensitivity: f32,

    /// Square input resolution of the model
    pub input_size: i32,

    /// Upper bound on one inference call; 0 runs inference inline without a bound
    pub inference_timeout_ms: u64,
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Output frame width
    pub output_width: i32,

    /// Output frame height
    pub output_height: i32,

    /// Target interval between ticks
    pub tick_interval_ms: u64,

    /// Flip frames horizontally, like a mirror
    pub mirror: bool,

    /// Zoom change per key press, in pixels
    pub zoom_step: i32,

    /// Draw the compliance status on the display frame
    pub show_status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Folder for reports and recordings
    pub folder: PathBuf,

    /// Frame rate written into recordings
    pub recording_fps: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_default.xml"),
            mask_classifier: PathBuf::from("assets/mask_classifier.onnx"),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            scale_factor: CASCADE_SCALE_FACTOR,
            min_neighbors: CASCADE_MIN_NEIGHBORS,
            min_face_size: CASCADE_MIN_FACE_SIZE,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            input_size: MASK_INPUT_SIZE,
            inference_timeout_ms: 2000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            mirror: true,
            zoom_step: DEFAULT_ZOOM_STEP,
            show_status: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("output"),
            recording_fps: DEFAULT_RECORDING_FPS,
        }
    }
}

impl DetectionConfig {
    pub fn cascade_params(&self) -> CascadeParams {
        CascadeParams {
            downscale_factor: self.downscale_factor,
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_face_size: self.min_face_size,
        }
    }
}

impl ClassifierConfig {
    /// Inference bound, or `None` for inline inference
    pub fn inference_timeout(&self) -> Option<Duration> {
        (self.inference_timeout_ms > 0).then(|| Duration::from_millis(self.inference_timeout_ms))
    }
}

impl DisplayConfig {
    pub fn output_size(&self) -> Size {
        Size::new(self.output_width, self.output_height)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges; model files are checked separately by [`Config::validate_models`]
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !(self.detection.downscale_factor.is_finite() && self.detection.downscale_factor >= 1.0) {
            return Err(Error::ConfigError("Downscale factor must be at least 1.0".to_string()));
        }
        if !(self.detection.scale_factor > 1.0) {
            return Err(Error::ConfigError("Cascade scale factor must be greater than 1.0".to_string()));
        }
        if self.detection.min_neighbors < 0 {
            return Err(Error::ConfigError("Minimum neighbors cannot be negative".to_string()));
        }
        if self.detection.min_face_size < 1 {
            return Err(Error::ConfigError("Minimum face size must be positive".to_string()));
        }

        let sensitivity = self.classifier.sensitivity;
        if !(sensitivity > 0.0 && sensitivity < 1.0) {
            return Err(Error::ConfigError(format!(
                "Sensitivity must be between 0.0 and 1.0 (exclusive), got {sensitivity}"
            )));
        }
        if self.classifier.input_size < 1 {
            return Err(Error::ConfigError("Classifier input size must be positive".to_string()));
        }

        if self.display.output_width < 1 || self.display.output_height < 1 {
            return Err(Error::ConfigError("Output size must be positive".to_string()));
        }
        if self.display.tick_interval_ms == 0 {
            return Err(Error::ConfigError("Tick interval must be greater than 0".to_string()));
        }
        if self.display.zoom_step < 1 {
            return Err(Error::ConfigError("Zoom step must be positive".to_string()));
        }

        if !(self.output.recording_fps > 0.0) {
            return Err(Error::ConfigError("Recording FPS must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Check that both model files exist
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the missing file
    pub fn validate_models(&self) -> Result<()> {
        if !self.models.face_cascade.exists() {
            return Err(Error::ConfigError(format!(
                "Face cascade not found: {}",
                self.models.face_cascade.display()
            )));
        }
        if !self.models.mask_classifier.exists() {
            return Err(Error::ConfigError(format!(
                "Mask classifier model not found: {}",
                self.models.mask_classifier.display()
            )));
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Mask Compliance Monitor Configuration

models:
  face_cascade: "assets/haarcascade_frontalface_default.xml"
  mask_classifier: "assets/mask_classifier.onnx"

detection:
  downscale_factor: 4.0
  scale_factor: 1.1
  min_neighbors: 3
  min_face_size: 30

classifier:
  sensitivity: 0.2
  input_size: 150
  inference_timeout_ms: 2000

display:
  output_width: 1024
  output_height: 576
  tick_interval_ms: 20
  mirror: true
  zoom_step: 50
  show_status: true

output:
  folder: "output"
  recording_fps: 10.0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
        parsed.validate().unwrap();
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed = Config::from_yaml("classifier:\n  sensitivity: 0.5\n").unwrap();
        assert_eq!(parsed.classifier.sensitivity, 0.5);
        assert_eq!(parsed.classifier.input_size, MASK_INPUT_SIZE);
        assert_eq!(parsed.display, DisplayConfig::default());
    }

    #[test]
    fn test_invalid_sensitivity_rejected() {
        let mut config = Config::default();
        config.classifier.sensitivity = 1.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        config.classifier.sensitivity = f32::NAN;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_invalid_downscale_rejected() {
        let mut config = Config::default();
        config.detection.downscale_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_zero_means_inline() {
        let mut config = ClassifierConfig::default();
        assert_eq!(config.inference_timeout(), Some(Duration::from_millis(2000)));
        config.inference_timeout_ms = 0;
        assert_eq!(config.inference_timeout(), None);
    }

    #[test]
    fn test_missing_models_reported() {
        let mut config = Config::default();
        config.models.face_cascade = PathBuf::from("/nonexistent/cascade.xml");
        let err = config.validate_models().unwrap_err();
        assert!(err.to_string().contains("cascade"));
    }
}
