//! Per-frame analysis: locate, crop, classify, aggregate.
//!
//! [`analyze_frame`] returns a [`FrameAnalysis`] and never draws; rendering is a separate
//! step in [`crate::overlay`]. [`process_tick`] chains the two for the driver and renders
//! nothing for unusable frames. Failures confined to one frame are logged and absorbed.

use crate::compliance::{ComplianceAggregator, ComplianceSnapshot};
use crate::face_detection::FaceLocator;
use crate::face_region::FaceRegion;
use crate::mask_detection::MaskClassifier;
use crate::overlay::{OverlayRenderer, RenderedFrame};
use crate::utils::image_conversion::is_usable_frame;
use crate::Result;
use log::{debug, warn};
use opencv::core::Mat;

/// Whether ticks run the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Frames are analyzed every tick
    #[default]
    Live,
    /// No tick invokes the pipeline
    Paused,
}

/// Everything that used to live in globals: statistics, zoom and the session flags
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Running compliance statistics
    pub aggregator: ComplianceAggregator,
    /// Live or paused
    pub mode: SessionMode,
    /// Whether rendered frames are being recorded
    pub recording: bool,
    /// Zoom in display pixels
    pub zoom: i32,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        self.mode == SessionMode::Live
    }

    /// Flip between live and paused; returns the new mode
    pub fn toggle_pause(&mut self) -> SessionMode {
        self.mode = match self.mode {
            SessionMode::Live => SessionMode::Paused,
            SessionMode::Paused => SessionMode::Live,
        };
        self.mode
    }

    /// Move the zoom by `delta`, keeping it within `[0, max_zoom]`
    pub fn adjust_zoom(&mut self, delta: i32, max_zoom: i32) -> i32 {
        self.zoom = self.zoom.saturating_add(delta).clamp(0, max_zoom.max(0));
        self.zoom
    }
}

/// A face together with the compliance decision made this tick
pub struct ClassifiedFace {
    pub region: FaceRegion,
    pub compliant: bool,
}

/// Structured result of one tick
pub struct FrameAnalysis {
    /// Faces that were located and classified
    pub faces: Vec<ClassifiedFace>,
    /// Boxes the locator returned that fell inside the frame
    pub detected: usize,
    /// Statistics after this frame was folded in
    pub stats: ComplianceSnapshot,
}

impl FrameAnalysis {
    fn skipped(aggregator: &ComplianceAggregator) -> Self {
        Self {
            faces: Vec::new(),
            detected: 0,
            stats: aggregator.snapshot(),
        }
    }
}

/// Analyze one full-resolution BGR frame and fold it into the session statistics
///
/// Unusable frames and detector failures yield an empty analysis and leave the
/// statistics untouched. A face whose classification fails is dropped from the results.
///
/// # Errors
///
/// Returns an error only if the frame cannot be downscaled for cropping
pub fn analyze_frame(
    frame: &Mat,
    locator: &mut dyn FaceLocator,
    classifier: &MaskClassifier,
    session: &mut SessionState,
) -> Result<FrameAnalysis> {
    if !is_usable_frame(frame) {
        warn!("Skipping unusable frame");
        return Ok(FrameAnalysis::skipped(&session.aggregator));
    }

    let boxes = match locator.detect(frame) {
        Ok(boxes) => boxes,
        Err(e) => {
            warn!("Face detection failed: {e}");
            return Ok(FrameAnalysis::skipped(&session.aggregator));
        }
    };

    let small = locator.downscale(frame)?;
    let upscale = locator.scale();

    let mut detected = 0;
    let mut faces = Vec::with_capacity(boxes.len());
    for bbox in boxes {
        let mut region = match FaceRegion::new(&small, bbox, upscale) {
            Ok(Some(region)) => region,
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to crop face {bbox:?}: {e}");
                continue;
            }
        };
        detected += 1;

        match region.classify_mask(classifier) {
            Ok(compliant) => {
                debug!(
                    "Face at {:?}: {}% mask, compliant={}",
                    region.area(),
                    region.mask_percentage(),
                    compliant
                );
                faces.push(ClassifiedFace { region, compliant });
            }
            Err(e) => warn!("Mask classification failed for {:?}: {e}", region.area()),
        }
    }

    let compliance: Vec<bool> = faces.iter().map(|f| f.compliant).collect();
    session.aggregator.update(detected, &compliance);

    Ok(FrameAnalysis {
        faces,
        detected,
        stats: session.aggregator.snapshot(),
    })
}

/// Analysis and rendering of one tick
pub struct TickOutput {
    pub analysis: FrameAnalysis,
    pub rendered: RenderedFrame,
}

/// Analyze a frame and render it with the current session settings
///
/// Returns `Ok(None)` for an unusable frame so the caller keeps its previous display.
///
/// # Errors
///
/// Returns an error if analysis or rendering of a usable frame fails
pub fn process_tick(
    frame: &Mat,
    locator: &mut dyn FaceLocator,
    classifier: &MaskClassifier,
    renderer: &OverlayRenderer,
    session: &mut SessionState,
) -> Result<Option<TickOutput>> {
    if !is_usable_frame(frame) {
        warn!("Skipping unusable frame");
        return Ok(None);
    }

    let analysis = analyze_frame(frame, locator, classifier, session)?;
    let rendered = renderer.compose(
        frame,
        &analysis.faces,
        session.zoom,
        session.recording,
        Some(&analysis.stats),
    )?;
    Ok(Some(TickOutput { analysis, rendered }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_pause() {
        let mut session = SessionState::new();
        assert!(session.is_live());
        assert_eq!(session.toggle_pause(), SessionMode::Paused);
        assert!(!session.is_live());
        assert_eq!(session.toggle_pause(), SessionMode::Live);
    }

    #[test]
    fn test_adjust_zoom_bounds() {
        let mut session = SessionState::new();
        assert_eq!(session.adjust_zoom(50, 480), 50);
        assert_eq!(session.adjust_zoom(-100, 480), 0);
        assert_eq!(session.adjust_zoom(1000, 480), 480);
    }
}
