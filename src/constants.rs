//! Constants used throughout the application

/// Factor by which frames are shrunk before face detection
pub const DEFAULT_DOWNSCALE_FACTOR: f64 = 4.0;

/// Cascade search scale step
pub const CASCADE_SCALE_FACTOR: f64 = 1.1;

/// Minimum neighbouring hits for a cascade candidate to survive grouping
pub const CASCADE_MIN_NEIGHBORS: i32 = 3;

/// Smallest face window, in downscaled pixels
pub const CASCADE_MIN_FACE_SIZE: i32 = 30;

/// Side length of the square crop the mask model expects
pub const MASK_INPUT_SIZE: i32 = 150;

/// Channels fed to the mask model
pub const MASK_INPUT_CHANNELS: usize = 3;

/// Index of the "mask worn" class in the model output
pub const MASK_CLASS_INDEX: usize = 1;

/// Byte to [0, 1] normalization divisor
pub const PIXEL_NORMALIZATION_SCALE: f32 = 255.0;

/// Sensitivity thresholds
pub const DEFAULT_SENSITIVITY: f32 = 0.2;
pub const SENSITIVITY_MIN: f32 = 0.01;
pub const SENSITIVITY_MAX: f32 = 0.99;
pub const SENSITIVITY_STEP: f32 = 0.05;

/// Weight given to mask-worn detections in the compliance ratio
pub const COMPLIANCE_BIAS: u64 = 3;

/// Ratio above which the compliance status is shown as healthy
pub const HEALTHY_COMPLIANCE_RATIO: f64 = 0.75;

/// Target tick interval in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

/// Display output size (1280x720 scaled by 0.8)
pub const DEFAULT_OUTPUT_WIDTH: i32 = 1024;
pub const DEFAULT_OUTPUT_HEIGHT: i32 = 576;

/// Zoom slider increment in pixels
pub const DEFAULT_ZOOM_STEP: i32 = 50;

/// Frames per second written to recordings
pub const DEFAULT_RECORDING_FPS: f64 = 10.0;

/// Recording indicator geometry
pub const RECORDING_DOT_CENTER: (i32, i32) = (40, 40);
pub const RECORDING_DOT_RADIUS: i32 = 15;
