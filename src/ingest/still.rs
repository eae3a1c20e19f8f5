use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// A local PNG/JPEG replayed as every frame.
pub struct StillImageSource {
    path: PathBuf,
    image: Option<RgbImage>,
    frame_count: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        let image = image::open(&self.path)
            .with_context(|| format!("failed to open image {}", self.path.display()))?
            .to_rgb8();
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path.display(),
            image.width(),
            image.height()
        );
        self.image = Some(image);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("still image source not connected"))?;
        let frame = Frame::new(image.clone(), self.frame_count);
        self.frame_count += 1;
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        self.image.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.path.display().to_string(),
        }
    }
}
