//! Color segmentation: threshold, restrict to the lot, then clean with morphology.
//!
//! Masks are `GrayImage`s holding 0 or 255. Morphology uses a solid `k x k`
//! square anchored at `(k/2, k/2)`, so for even `k` an opening or closing moves
//! shapes one pixel right and down, as OpenCV's default anchor does. Pixels
//! outside the image are ignored by both erosion and dilation.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_close, grayscale_open, Mask};

use crate::detect::color::HsvRange;
use crate::frame::HsvImage;

/// Largest structuring element side the morphology accepts.
pub const MAX_KERNEL: u32 = 255;

/// Solid `k x k` structuring element; `k` is clamped to `1..=MAX_KERNEL`.
pub fn structuring_element(k: u32) -> Mask {
    let k = k.clamp(1, MAX_KERNEL);
    let anchor = (k / 2) as u8;
    Mask::from_image(&GrayImage::from_pixel(k, k, Luma([255])), anchor, anchor)
}

/// Erode then dilate: drops specks smaller than the kernel.
pub fn open(mask: &GrayImage, k: u32) -> GrayImage {
    if k <= 1 {
        return mask.clone();
    }
    grayscale_open(mask, &structuring_element(k))
}

/// Dilate then erode: bridges gaps narrower than the kernel.
pub fn close(mask: &GrayImage, k: u32) -> GrayImage {
    if k <= 1 {
        return mask.clone();
    }
    grayscale_close(mask, &structuring_element(k))
}

/// Number of set pixels.
pub fn count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|px| px[0] != 0).count()
}

/// Full segmentation for one color class.
///
/// `area_mask` is the rasterised parking area (non-zero = inside); `None`
/// means the whole frame is eligible.
pub fn segment(
    hsv: &HsvImage,
    range: &HsvRange,
    area_mask: Option<&GrayImage>,
    open_kernel: u32,
    close_kernel: u32,
) -> GrayImage {
    let mut mask = range.threshold(hsv);
    if let Some(area) = area_mask {
        for (px, inside) in mask.pixels_mut().zip(area.pixels()) {
            if inside[0] == 0 {
                px[0] = 0;
            }
        }
    }
    close(&open(&mask, open_kernel), close_kernel)
}
