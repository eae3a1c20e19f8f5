use image::{GrayImage, Luma};
use imageproc::map::map_colors;
use serde::{Deserialize, Serialize};

use crate::frame::HsvImage;

/// Vehicle body color classes the detector segments for.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    Blue,
    Yellow,
    White,
}

impl ColorClass {
    pub const ALL: [ColorClass; 3] = [ColorClass::Blue, ColorClass::Yellow, ColorClass::White];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorClass::Blue => "blue",
            ColorClass::Yellow => "yellow",
            ColorClass::White => "white",
        }
    }

    /// Built-in HSV band for this class, tuned for the model lot under indoor lighting.
    pub fn default_range(&self) -> HsvRange {
        match self {
            ColorClass::Blue => HsvRange::new([100, 100, 120], [130, 255, 255]),
            ColorClass::Yellow => HsvRange::new([25, 50, 50], [40, 255, 255]),
            ColorClass::White => HsvRange::new([0, 0, 180], [180, 25, 255]),
        }
    }
}

impl std::fmt::Display for ColorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive HSV box: `lower[i] <= pixel[i] <= upper[i]` on all three channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }

    pub fn is_valid(&self) -> bool {
        (0..3).all(|i| self.lower[i] <= self.upper[i])
    }

    /// Membership mask over the whole image: 255 inside the band, 0 outside.
    pub fn threshold(&self, hsv: &HsvImage) -> GrayImage {
        map_colors(hsv.as_image(), |px| Luma([if self.contains(px.0) { 255 } else { 0 }]))
    }
}

/// One color class together with the band that selects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorProfile {
    pub class: ColorClass,
    pub range: HsvRange,
}

impl ColorProfile {
    pub fn defaults() -> Vec<ColorProfile> {
        ColorClass::ALL
            .iter()
            .map(|&class| ColorProfile {
                class,
                range: class.default_range(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let blue = ColorClass::Blue.default_range();
        assert!(blue.contains([100, 100, 120]));
        assert!(blue.contains([130, 255, 255]));
        assert!(!blue.contains([99, 200, 200]));
        assert!(!blue.contains([115, 99, 200]));
    }

    #[test]
    fn white_band_rejects_saturated_pixels() {
        let white = ColorClass::White.default_range();
        assert!(white.contains([0, 0, 240]));
        assert!(!white.contains([0, 26, 240]));
        assert!(!white.contains([0, 0, 179]));
    }

    #[test]
    fn class_names_serialize_lowercase() {
        let json = serde_json::to_string(&ColorClass::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        assert_eq!(ColorClass::White.to_string(), "white");
    }

    #[test]
    fn threshold_marks_in_band_pixels() {
        use image::{Rgb, RgbImage};

        let mut rgb = RgbImage::from_pixel(3, 1, Rgb([40, 40, 45]));
        rgb.put_pixel(1, 0, Rgb([30, 60, 200]));
        let mask = ColorClass::Blue
            .default_range()
            .threshold(&HsvImage::from_rgb(&rgb));
        assert_eq!(mask.as_raw(), &vec![0, 255, 0]);
    }
}
