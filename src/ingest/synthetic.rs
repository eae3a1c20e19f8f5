use anyhow::{bail, Result};
use image::{Rgb, RgbImage};

use super::{CaptureConfig, FrameSource, SourceStats};
use crate::frame::Frame;
use crate::geometry::Rect;

pub const ASPHALT: [u8; 3] = [40, 40, 45];
pub const BLUE_BODY: [u8; 3] = [30, 60, 200];
pub const YELLOW_BODY: [u8; 3] = [230, 220, 40];
pub const WHITE_BODY: [u8; 3] = [240, 240, 240];

/// Car footprint as seen from the overhead camera.
pub const CAR_SIZE: (i32, i32) = (100, 80);

const DRIVE_START_X: i32 = 900;
const DRIVE_LANE_Y: i32 = 620;
const DRIVE_STEP: i32 = 6;
const DRIVE_PERIOD: u64 = 110;

/// Synthetic overhead scene (`stub://`).
///
/// A blue car sits in spot 1, a white car in spot 7, and a yellow car drives
/// along the bottom lane towards ultrasonic sensor 1, restarting every
/// `DRIVE_PERIOD` frames. Positions are in 1280x720 lot coordinates; smaller
/// frames are clipped.
pub struct SyntheticSource {
    config: CaptureConfig,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    /// Box of the car centered on `(cx, cy)`.
    pub fn car_at(cx: i32, cy: i32) -> Rect {
        Rect::new(cx - CAR_SIZE.0 / 2, cy - CAR_SIZE.1 / 2, CAR_SIZE.0, CAR_SIZE.1)
    }

    /// Center of the driving yellow car in frame `index`.
    pub fn yellow_position(index: u64) -> (i32, i32) {
        let step = (index % DRIVE_PERIOD) as i32;
        (DRIVE_START_X - step * DRIVE_STEP, DRIVE_LANE_Y)
    }

    /// Render the scene for frame `index`.
    pub fn render(width: u32, height: u32, index: u64) -> RgbImage {
        let mut img = RgbImage::from_pixel(width, height, Rgb(ASPHALT));
        fill(&mut img, Self::car_at(423, 188), BLUE_BODY);
        fill(&mut img, Self::car_at(675, 463), WHITE_BODY);
        let (x, y) = Self::yellow_position(index);
        fill(&mut img, Self::car_at(x, y), YELLOW_BODY);
        img
    }
}

fn fill(img: &mut RgbImage, r: Rect, color: [u8; 3]) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    for y in r.y.max(0)..r.bottom().min(h) {
        for x in r.x.max(0)..r.right().min(w) {
            img.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            bail!(
                "invalid synthetic frame size {}x{}",
                self.config.width,
                self.config.height
            );
        }
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.source,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let index = self.frame_count;
        self.frame_count += 1;
        let image = Self::render(self.config.width, self.config.height, index);
        Ok(Frame::new(image, index))
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.source.clone(),
        }
    }
}
