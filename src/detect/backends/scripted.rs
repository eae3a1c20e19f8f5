use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::geometry::ParkingArea;

/// Backend that replays scripted detections instead of looking at pixels.
///
/// Call `n` returns script entry `n`; once the script runs out the last entry
/// repeats. An empty script yields no detections. The parking area is honoured
/// the same way the pixel backends honour it.
pub struct ScriptedBackend {
    script: Vec<Vec<Detection>>,
    calls: usize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, calls: 0 }
    }

    /// The same detections every frame.
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::new(vec![detections])
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame, area: Option<&ParkingArea>) -> Result<Vec<Detection>> {
        let entry = self
            .script
            .get(self.calls)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        self.calls += 1;

        Ok(entry
            .into_iter()
            .filter(|d| area.map_or(true, |a| a.contains(d.centroid)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ColorClass;
    use crate::geometry::Rect;
    use image::RgbImage;

    #[test]
    fn replays_then_repeats_last_entry() {
        let a = Detection::from_box(ColorClass::Blue, Rect::new(0, 0, 60, 40));
        let b = Detection::from_box(ColorClass::Yellow, Rect::new(100, 0, 60, 40));
        let mut backend = ScriptedBackend::new(vec![vec![a.clone()], vec![a, b]]);
        let frame = Frame::new(RgbImage::new(4, 4), 0);

        assert_eq!(backend.detect(&frame, None).unwrap().len(), 1);
        assert_eq!(backend.detect(&frame, None).unwrap().len(), 2);
        assert_eq!(backend.detect(&frame, None).unwrap().len(), 2);
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn empty_script_detects_nothing() {
        let mut backend = ScriptedBackend::new(Vec::new());
        let frame = Frame::new(RgbImage::new(4, 4), 0);
        assert!(backend.detect(&frame, None).unwrap().is_empty());
    }
}
