use anyhow::{bail, Result};
use image::GrayImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::blob::{self, BlobFilter};
use crate::detect::color::ColorProfile;
use crate::detect::result::Detection;
use crate::detect::segment;
use crate::frame::Frame;
use crate::geometry::ParkingArea;

/// Color-threshold backend: HSV segmentation per profile, then blob extraction.
pub struct HsvBlobDetector {
    profiles: Vec<ColorProfile>,
    filter: BlobFilter,
    open_kernel: u32,
    close_kernel: u32,
    area_mask: Option<(ParkingArea, GrayImage)>,
}

impl HsvBlobDetector {
    pub fn new(profiles: Vec<ColorProfile>, filter: BlobFilter) -> Self {
        Self {
            profiles,
            filter,
            open_kernel: 5,
            close_kernel: 8,
            area_mask: None,
        }
    }

    pub fn with_kernels(mut self, open_kernel: u32, close_kernel: u32) -> Self {
        self.open_kernel = open_kernel;
        self.close_kernel = close_kernel;
        self
    }

    pub fn profiles(&self) -> &[ColorProfile] {
        &self.profiles
    }

    /// The rasterised area is reused until the area or the frame size changes.
    fn refresh_area_mask(&mut self, area: &ParkingArea, width: u32, height: u32) {
        if let Some((cached, mask)) = &self.area_mask {
            if cached == area && mask.dimensions() == (width, height) {
                return;
            }
        }
        self.area_mask = Some((area.clone(), area.mask(width, height)));
    }
}

impl DetectorBackend for HsvBlobDetector {
    fn name(&self) -> &'static str {
        "hsv"
    }

    fn detect(&mut self, frame: &Frame, area: Option<&ParkingArea>) -> Result<Vec<Detection>> {
        if frame.width() == 0 || frame.height() == 0 {
            bail!("empty frame {}", frame.index);
        }
        let hsv = frame.to_hsv();
        if let Some(a) = area {
            self.refresh_area_mask(a, frame.width(), frame.height());
        }
        let area_mask = area.and(self.area_mask.as_ref().map(|(_, mask)| mask));

        let mut detections = Vec::new();
        for profile in &self.profiles {
            let mask = segment::segment(
                &hsv,
                &profile.range,
                area_mask,
                self.open_kernel,
                self.close_kernel,
            );
            let found = blob::extract(&mask, &hsv, profile.class, &self.filter, area);
            log::trace!(
                "frame {}: {} {} blob(s)",
                frame.index,
                found.len(),
                profile.class
            );
            detections.extend(found);
        }
        Ok(detections)
    }
}
