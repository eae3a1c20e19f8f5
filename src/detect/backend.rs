use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::ParkingArea;

/// Detector backend trait.
///
/// A backend turns one frame into raw, unmerged vehicle detections. When a
/// parking area is given, detections must be restricted to it; with `None` the
/// whole frame is eligible.
///
/// Errors are per-frame: the caller logs them and treats the cycle as having
/// produced no detections.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, area: Option<&ParkingArea>) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
