//! Recording of annotated frames to a video file.

use crate::{Error, Result};
use chrono::Local;
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use std::path::{Path, PathBuf};

/// File name for a recording started now
#[must_use]
pub fn recording_file_name() -> String {
    format!("Mask_Recording_{}.avi", Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

/// An open video recording
pub struct Recorder {
    writer: VideoWriter,
    path: PathBuf,
    frame_size: Size,
    frames: u64,
}

impl Recorder {
    /// Start recording frames of `frame_size` into `folder`
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or no encoder accepts the file
    pub fn start<P: AsRef<Path>>(folder: P, frame_size: Size, fps: f64) -> Result<Self> {
        std::fs::create_dir_all(folder.as_ref())?;
        let path = folder.as_ref().join(recording_file_name());
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Recording path is not UTF-8: {}", path.display())))?;

        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')?;
        let writer = VideoWriter::new(path_str, fourcc, fps, frame_size, true)?;
        if !writer.is_opened()? {
            return Err(Error::Capture(format!("Could not open video writer at {}", path.display())));
        }

        log::info!("Recording to {} at {fps} fps", path.display());
        Ok(Self {
            writer,
            path,
            frame_size,
            frames: 0,
        })
    }

    /// Append one BGR frame; frames of a different size are skipped
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder rejects the frame
    pub fn write(&mut self, frame: &Mat) -> Result<()> {
        if frame.size()? != self.frame_size {
            log::warn!(
                "Skipping {}x{} frame for {}x{} recording",
                frame.cols(),
                frame.rows(),
                self.frame_size.width,
                self.frame_size.height
            );
            return Ok(());
        }
        self.writer.write(frame)?;
        self.frames += 1;
        Ok(())
    }

    /// Close the file and return where it was saved
    ///
    /// # Errors
    ///
    /// Returns an error if the writer cannot be released
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.release()?;
        log::info!("Video file saved at {} ({} frames)", self.path.display(), self.frames);
        Ok(self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
