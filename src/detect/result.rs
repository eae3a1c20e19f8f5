use serde::{Deserialize, Serialize};

use crate::detect::color::ColorClass;
use crate::geometry::{Point, Rect};

/// One color blob that passed the shape filters, or a merge of several.
///
/// Detections live for a single frame cycle; the tracker copies what it needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub color: ColorClass,
    pub bbox: Rect,
    pub centroid: Point,
    /// Contour area in px².
    pub area: f64,
    /// `w / h` of the bounding box.
    pub aspect_ratio: f64,
    /// `area / (w * h)`.
    pub extent: f64,
    /// Closed contour length in px.
    pub perimeter: f64,
    /// Mean HSV of the masked pixels inside the box, one decimal. `None` on merged detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_hsv: Option<[f32; 3]>,
    /// How many raw blobs this detection stands for.
    pub merged_count: usize,
}

impl Detection {
    /// A detection covering exactly `bbox`, as a solid rectangle blob would produce.
    pub fn from_box(color: ColorClass, bbox: Rect) -> Self {
        let area = ((bbox.w - 1).max(0) as f64) * ((bbox.h - 1).max(0) as f64);
        let box_area = bbox.area().max(1) as f64;
        Self {
            color,
            bbox,
            centroid: bbox.center(),
            area,
            aspect_ratio: bbox.w as f64 / bbox.h.max(1) as f64,
            extent: area / box_area,
            perimeter: 2.0 * ((bbox.w - 1).max(0) + (bbox.h - 1).max(0)) as f64,
            mean_hsv: None,
            merged_count: 1,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged_count > 1
    }
}
