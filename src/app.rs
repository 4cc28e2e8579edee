//! Main application module: capture, tick loop and keyboard controls.

use crate::{
    compliance::ComplianceSnapshot,
    config::Config,
    constants::{DEFAULT_OUTPUT_HEIGHT, SENSITIVITY_STEP},
    error::{Error, Result},
    face_detection::{CascadeFaceLocator, FaceLocator},
    mask_detection::MaskClassifier,
    overlay::OverlayRenderer,
    pipeline::{process_tick, SessionMode, SessionState},
    recorder::Recorder,
    report::ComplianceReport,
};
use log::{debug, info, warn};
use opencv::{
    core::{self, Mat},
    highgui::{self, WINDOW_NORMAL},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};
use std::time::Instant;

const WINDOW_NAME: &str = "Mask Compliance Monitor";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Camera index or video file path
    pub video_source: VideoSource,
    /// Models, detection, display and output settings
    pub settings: Config,
    /// Run without a window or keyboard controls
    pub headless: bool,
    /// Stop after this many analyzed frames
    pub max_frames: Option<u64>,
}

/// Video source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

/// Keyboard controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    ToggleRecording,
    ExportReport,
    SensitivityUp,
    SensitivityDown,
    ZoomIn,
    ZoomOut,
    ResetStatistics,
    Quit,
}

impl Command {
    /// Map a `highgui::wait_key` code to a command
    pub fn from_key(key: i32) -> Option<Self> {
        if key < 0 {
            return None;
        }
        let command = match u8::try_from(key & 0xFF).ok()? {
            b'p' | b' ' => Self::TogglePause,
            b'r' => Self::ToggleRecording,
            b'e' => Self::ExportReport,
            b'+' | b'=' => Self::SensitivityUp,
            b'-' | b'_' => Self::SensitivityDown,
            b']' => Self::ZoomIn,
            b'[' => Self::ZoomOut,
            b'c' => Self::ResetStatistics,
            b'q' | 27 => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

enum FrameRead {
    Frame(Mat),
    Missing,
    EndOfStream,
}

/// Mask compliance monitoring application
pub struct MaskWatchApp {
    config: AppConfig,
    video_capture: VideoCapture,
    locator: Box<dyn FaceLocator>,
    classifier: MaskClassifier,
    renderer: OverlayRenderer,
    session: SessionState,
    recorder: Option<Recorder>,
    last_display: Option<Mat>,
    frame_height: i32,
}

impl MaskWatchApp {
    /// Load the models and open the video source
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a model fails to load or the
    /// capture cannot be opened
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing mask compliance monitor");
        let settings = &config.settings;
        settings.validate()?;

        info!("Loading face cascade from {}", settings.models.face_cascade.display());
        let locator = CascadeFaceLocator::new(&settings.models.face_cascade, settings.detection.cascade_params())?;

        info!("Loading mask classifier from {}", settings.models.mask_classifier.display());
        let classifier = MaskClassifier::from_onnx(
            &settings.models.mask_classifier,
            settings.classifier.inference_timeout(),
        )?
        .with_input_size(settings.classifier.input_size);
        classifier.set_sensitivity(settings.classifier.sensitivity)?;

        let video_capture = open_capture(&config.video_source)?;

        let renderer =
            OverlayRenderer::new(settings.display.output_size()).with_status(settings.display.show_status);

        if !config.headless {
            highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        }

        Ok(Self {
            config,
            video_capture,
            locator: Box::new(locator),
            classifier,
            renderer,
            session: SessionState::new(),
            recorder: None,
            last_display: None,
            frame_height: DEFAULT_OUTPUT_HEIGHT,
        })
    }

    /// Run the tick loop until quit, end of file or the frame limit
    ///
    /// # Errors
    ///
    /// Returns an error if the capture device or the window fails; per-tick failures are
    /// logged and the tick is skipped
    pub fn run(&mut self) -> Result<()> {
        info!("Starting monitoring loop");
        let tick_interval = self.config.settings.display.tick_interval();
        let mut frame_count: u64 = 0;

        loop {
            let started = Instant::now();

            if self.session.is_live() {
                match self.read_frame()? {
                    FrameRead::Frame(frame) => {
                        if let Err(e) = self.tick(&frame) {
                            warn!("Tick failed, keeping previous display: {e}");
                        }
                        frame_count += 1;
                    }
                    FrameRead::Missing => warn!("No frame from camera, skipping tick"),
                    FrameRead::EndOfStream => {
                        info!("End of video file reached");
                        break;
                    }
                }

                if self.config.max_frames.is_some_and(|max| frame_count >= max) {
                    info!("Processed {frame_count} frames, stopping");
                    break;
                }
            }

            if !self.config.headless {
                self.show()?;
                let key = highgui::wait_key(1)?;
                if let Some(command) = Command::from_key(key) {
                    if !self.handle_command(command)? {
                        info!("Exit requested by user");
                        break;
                    }
                }
            }

            // An overrunning tick starts the next one immediately
            if let Some(remaining) = tick_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }

        self.shutdown()
    }

    /// Current statistics
    pub fn stats(&self) -> ComplianceSnapshot {
        self.session.aggregator.snapshot()
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        let mut frame = Mat::default();
        if !self.video_capture.read(&mut frame)? || frame.empty() {
            if matches!(self.config.video_source, VideoSource::File(_)) {
                return Ok(FrameRead::EndOfStream);
            }
            return Ok(FrameRead::Missing);
        }

        if self.config.settings.display.mirror {
            let mut mirrored = Mat::default();
            core::flip(&frame, &mut mirrored, 1)?;
            frame = mirrored;
        }
        Ok(FrameRead::Frame(frame))
    }

    fn tick(&mut self, frame: &Mat) -> Result<()> {
        let Some(output) = process_tick(
            frame,
            self.locator.as_mut(),
            &self.classifier,
            &self.renderer,
            &mut self.session,
        )?
        else {
            return Ok(());
        };
        self.frame_height = frame.rows();

        let stats = &output.analysis.stats;
        debug!(
            "{} faces, compliance {:.4}, max people {}",
            output.analysis.detected, stats.ratio, stats.max_people
        );

        if self.session.recording {
            self.record(&output.rendered.annotated);
        }
        self.last_display = Some(output.rendered.display);
        Ok(())
    }

    fn record(&mut self, annotated: &Mat) {
        if self.recorder.is_none() {
            let output = &self.config.settings.output;
            let started = annotated
                .size()
                .map_err(Error::from)
                .and_then(|size| Recorder::start(&output.folder, size, output.recording_fps));
            match started {
                Ok(recorder) => self.recorder = Some(recorder),
                Err(e) => {
                    warn!("Could not start recording: {e}");
                    self.session.recording = false;
                    return;
                }
            }
        }

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(annotated) {
                warn!("Failed to write frame to {}: {e}", recorder.path().display());
            }
        }
    }

    fn stop_recording(&mut self) {
        self.session.recording = false;
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.finish() {
                warn!("Failed to finalize recording: {e}");
            }
        }
    }

    fn show(&self) -> Result<()> {
        if let Some(display) = &self.last_display {
            // The display frame is RGB; highgui expects BGR
            let mut bgr = Mat::default();
            imgproc::cvt_color(display, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
            highgui::imshow(WINDOW_NAME, &bgr)?;
        }
        Ok(())
    }

    /// Apply one keyboard command; returns `false` when the loop should stop
    fn handle_command(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::TogglePause => match self.session.toggle_pause() {
                SessionMode::Paused => {
                    info!("Paused");
                    if self.session.recording {
                        info!("Stopping recording on pause");
                        self.stop_recording();
                    }
                }
                SessionMode::Live => info!("Resumed"),
            },
            Command::ToggleRecording => {
                if self.session.recording {
                    self.stop_recording();
                } else if self.session.is_live() {
                    info!("Recording started");
                    self.session.recording = true;
                } else {
                    warn!("Resume before recording");
                }
            }
            Command::ExportReport => {
                let report = ComplianceReport::from_snapshot(&self.stats());
                if let Err(e) = report.export(&self.config.settings.output.folder) {
                    warn!("Failed to export compliance report: {e}");
                }
            }
            Command::SensitivityUp => {
                self.classifier.adjust_sensitivity(SENSITIVITY_STEP);
            }
            Command::SensitivityDown => {
                self.classifier.adjust_sensitivity(-SENSITIVITY_STEP);
            }
            Command::ZoomIn | Command::ZoomOut => {
                let step = self.config.settings.display.zoom_step;
                let delta = if command == Command::ZoomIn { step } else { -step };
                let zoom = self.session.adjust_zoom(delta, self.frame_height);
                debug!("Zoom set to {zoom}");
            }
            Command::ResetStatistics => self.session.aggregator.reset(),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop_recording();

        let stats = self.stats();
        info!(
            "Session finished: {} masked, {} unmasked, max {} people, compliance {:.2}%",
            stats.mask_worn,
            stats.no_mask,
            stats.max_people,
            stats.percent()
        );

        if !self.config.headless {
            highgui::destroy_all_windows()?;
        }
        Ok(())
    }
}

fn open_capture(source: &VideoSource) -> Result<VideoCapture> {
    let capture = match source {
        VideoSource::Camera(index) => {
            info!("Opening camera {index}");
            let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
            // Webcam only; keeps the newest frame
            cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
            cap
        }
        VideoSource::File(path) => {
            info!("Opening video file: {path}");
            VideoCapture::from_file(path, videoio::CAP_ANY)?
        }
    };

    if !capture.is_opened()? {
        return Err(Error::Capture(format!("Could not open video source {source:?}")));
    }
    Ok(capture)
}
