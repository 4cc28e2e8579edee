//! Mask compliance monitoring for live video.
//!
//! This library watches a camera or video file and reports how many of the people in
//! view are wearing face masks:
//! - `OpenCV` Haar cascades to locate frontal faces
//! - ONNX Runtime for the mask classifier
//! - A running, biased compliance ratio and a max-people count
//!
//! Each tick runs the same pipeline:
//! 1. Downscale the frame and locate faces
//! 2. Crop each face and compute its mask probability
//! 3. Compare the probability against the live sensitivity threshold
//! 4. Fold the decisions into the session statistics
//! 5. Draw boxes and labels, zoom, resize and convert for display
//!
//! # Examples
//!
//! ## Analyzing a single image
//!
//! ```no_run
//! use mask_compliance_monitor::{
//!     face_detection::{CascadeFaceLocator, CascadeParams},
//!     mask_detection::MaskClassifier,
//!     overlay::OverlayRenderer,
//!     pipeline::{analyze_frame, SessionState},
//! };
//! use opencv::imgcodecs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut locator = CascadeFaceLocator::new(
//!     "assets/haarcascade_frontalface_default.xml",
//!     CascadeParams::default(),
//! )?;
//! let classifier = MaskClassifier::from_onnx("assets/mask_classifier.onnx", None)?;
//! let mut session = SessionState::new();
//!
//! let image = imgcodecs::imread("crowd.jpg", imgcodecs::IMREAD_COLOR)?;
//! let analysis = analyze_frame(&image, &mut locator, &classifier, &mut session)?;
//!
//! for face in &analysis.faces {
//!     println!("{:?}: {}% mask", face.region.area(), face.region.mask_percentage());
//! }
//! println!("Compliance: {:.2}", analysis.stats.ratio);
//!
//! let rendered = OverlayRenderer::default().compose(&image, &analysis.faces, 0, false, None)?;
//! imgcodecs::imwrite("annotated.jpg", &rendered.annotated, &opencv::core::Vector::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Adjusting the sensitivity
//!
//! ```no_run
//! use mask_compliance_monitor::mask_detection::MaskClassifier;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = MaskClassifier::from_onnx("assets/mask_classifier.onnx", None)?;
//! classifier.set_sensitivity(0.5)?;
//!
//! // Later, from a keyboard control
//! let value = classifier.adjust_sensitivity(0.05);
//! assert_eq!(value, 0.55);
//! # Ok(())
//! # }
//! ```

/// Constants used throughout the application
pub mod constants;

/// Error types and result handling
pub mod error;

/// Utility functions for boxes, casts and tensor conversion
pub mod utils;

/// Face location with Haar cascades
pub mod face_detection;

/// Cropped face regions and their display coordinates
pub mod face_region;

/// Mask classification using ONNX Runtime
pub mod mask_detection;

/// Running compliance statistics
pub mod compliance;

/// Annotated frame composition
pub mod overlay;

/// Per-frame analysis and session state
pub mod pipeline;

/// Compliance report export
pub mod report;

/// Video recording of annotated frames
pub mod recorder;

/// Configuration management
pub mod config;

/// Main application module
pub mod app;

pub use error::{Error, Result};
