//! Frame ingestion sources.
//!
//! - `stub://...`: synthetic overhead view of the model lot with moving vehicles
//! - a local PNG/JPEG path: one still image replayed every cycle
//!
//! Capture hardware is an external collaborator; anything with a URL scheme
//! other than `stub://` is rejected here. Sources are opened once at startup and
//! a failed `connect` is fatal to the caller. A failed `next_frame` is a
//! transient capture failure and only costs that cycle.

pub mod still;
pub mod synthetic;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use still::StillImageSource;
pub use synthetic::SyntheticSource;

/// Capture parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// `stub://<name>` or a local image path.
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// Target frame rate the daemon paces itself to.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: "stub://lot".to_string(),
            width: 1280,
            height: 720,
            fps: 20,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource: Send {
    /// Acquire the device. Called once before the first frame.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build the source named by `config.source` (not yet connected).
pub fn open(config: &CaptureConfig) -> Result<Box<dyn FrameSource>> {
    let source = config.source.trim();
    if source.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.clone())));
    }
    if !is_local_file_path(source) {
        return Err(anyhow!(
            "unsupported frame source '{}': use stub://<name> or a local image path",
            source
        ));
    }
    Ok(Box::new(StillImageSource::new(source)))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}
