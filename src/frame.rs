//! Captured frames and color-space conversion.
//!
//! - `Frame`: one RGB capture with its sequence index and monotonic capture instant.
//! - `HsvImage`: per-pixel HSV in the 8-bit convention (H in [0,180), S and V in [0,255]).

use image::{Rgb, RgbImage};
use imageproc::map::map_colors;
use std::time::Instant;

/// One captured frame. Pixel layout is RGB; the sources convert before handing it over.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Monotonic sequence number assigned by the source, starting at 0.
    pub index: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image,
            index,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_hsv(&self) -> HsvImage {
        HsvImage::from_rgb(&self.image)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// HSV
// ----------------------------------------------------------------------------

/// HSV pixels stored in an 8-bit three-channel buffer (channels are H, S, V).
#[derive(Clone, Debug)]
pub struct HsvImage(RgbImage);

impl HsvImage {
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        Self(map_colors(rgb, |px| Rgb(rgb_to_hsv(px[0], px[1], px[2]))))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        self.0.get_pixel(x, y).0
    }

    /// The underlying buffer, for the `imageproc` pixel maps.
    pub fn as_image(&self) -> &RgbImage {
        &self.0
    }
}

/// Convert one RGB pixel to 8-bit HSV (hue halved to fit a byte).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u32 % 180) as u8;
    [h, s.round().min(255.0) as u8, v as u8]
}
