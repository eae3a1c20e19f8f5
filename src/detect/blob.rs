//! Blob extraction: outer contours of the cleaned mask, shape filtering.
//!
//! Contours come from `imageproc`'s border following over 8-connected
//! regions. Only top-level outer borders count, so a region sitting inside a
//! hole of another region is dropped. Area is the shoelace area of the traced
//! border and perimeter its closed length, so a solid `w x h` block measures
//! `(w-1)(h-1)` px² and `2(w-1) + 2(h-1)` px.

use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

use crate::detect::color::ColorClass;
use crate::detect::result::Detection;
use crate::frame::HsvImage;
use crate::geometry::{ParkingArea, Rect};

/// Shape bounds a blob must satisfy to count as a vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobFilter {
    pub min_area: f64,
    pub min_width: i32,
    pub max_width: i32,
    pub min_height: i32,
    pub max_height: i32,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_extent: f64,
    pub min_perimeter: f64,
}

impl Default for BlobFilter {
    fn default() -> Self {
        Self {
            min_area: 1200.0,
            min_width: 50,
            max_width: 300,
            min_height: 30,
            max_height: 200,
            min_aspect: 0.3,
            max_aspect: 4.0,
            min_extent: 0.3,
            min_perimeter: 60.0,
        }
    }
}

impl BlobFilter {
    /// Checks in the order the measurements become available; the first failing bound rejects.
    pub fn accepts(&self, area: f64, bbox: &Rect, perimeter: f64) -> bool {
        if area < self.min_area {
            return false;
        }
        if bbox.w < self.min_width
            || bbox.h < self.min_height
            || bbox.w > self.max_width
            || bbox.h > self.max_height
        {
            return false;
        }
        let aspect = bbox.w as f64 / bbox.h as f64;
        if aspect < self.min_aspect || aspect > self.max_aspect {
            return false;
        }
        if area / (bbox.area() as f64) < self.min_extent {
            return false;
        }
        perimeter >= self.min_perimeter
    }
}

/// Outer border of one region, in image coordinates.
#[derive(Clone, Debug)]
pub struct Contour {
    pub points: Vec<PixelPoint<i32>>,
}

impl Contour {
    pub fn area(&self) -> f64 {
        contour_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    /// Inclusive pixel bounds: a single pixel has `w == h == 1`.
    pub fn bounding_rect(&self) -> Rect {
        let min_x = self.points.iter().map(|p| p.x).min().unwrap_or(0);
        let max_x = self.points.iter().map(|p| p.x).max().unwrap_or(-1);
        let min_y = self.points.iter().map(|p| p.y).min().unwrap_or(0);
        let max_y = self.points.iter().map(|p| p.y).max().unwrap_or(-1);
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

/// All external contours of a mask, in raster order of their first pixel.
///
/// The mask is traced inside a one-pixel background frame so regions touching
/// the image edge still start an outer border.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Contour {
            points: c
                .points
                .into_iter()
                .map(|p| PixelPoint::new(p.x - 1, p.y - 1))
                .collect(),
        })
        .collect()
}

fn mean_hsv(mask: &GrayImage, hsv: &HsvImage, bbox: &Rect) -> Option<[f32; 3]> {
    let mut sum = [0u64; 3];
    let mut n = 0u64;
    for y in bbox.y..bbox.bottom() {
        for x in bbox.x..bbox.right() {
            if mask.get_pixel(x as u32, y as u32)[0] != 0 {
                let px = hsv.get(x as u32, y as u32);
                for c in 0..3 {
                    sum[c] += px[c] as u64;
                }
                n += 1;
            }
        }
    }
    if n == 0 {
        return None;
    }
    let round1 = |v: u64| ((v as f64 / n as f64) * 10.0).round() as f32 / 10.0;
    Some([round1(sum[0]), round1(sum[1]), round1(sum[2])])
}

/// Turn one class's cleaned mask into filtered detections.
///
/// When `area` is set, blobs whose centroid falls outside it are dropped.
pub fn extract(
    mask: &GrayImage,
    hsv: &HsvImage,
    class: ColorClass,
    filter: &BlobFilter,
    area: Option<&ParkingArea>,
) -> Vec<Detection> {
    let mut out = Vec::new();
    for contour in external_contours(mask) {
        let contour_area = contour.area();
        let bbox = contour.bounding_rect();
        let perimeter = contour.perimeter();
        if !filter.accepts(contour_area, &bbox, perimeter) {
            continue;
        }
        let centroid = bbox.center();
        if let Some(area) = area {
            if !area.contains(centroid) {
                continue;
            }
        }
        out.push(Detection {
            color: class,
            bbox,
            centroid,
            area: contour_area,
            aspect_ratio: bbox.w as f64 / bbox.h as f64,
            extent: contour_area / (bbox.area() as f64),
            perimeter,
            mean_hsv: mean_hsv(mask, hsv, &bbox),
            merged_count: 1,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as PixelRect;

    /// Mask with the half-open rectangles `[x0, x1) x [y0, y1)` set to `value`.
    fn paint(m: &mut GrayImage, rects: &[(u32, u32, u32, u32)], value: u8) {
        for &(x0, y0, x1, y1) in rects {
            let r = PixelRect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
            draw_filled_rect_mut(m, r, Luma([value]));
        }
    }

    fn mask_with(w: u32, h: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut m = GrayImage::new(w, h);
        paint(&mut m, rects, 255);
        m
    }

    fn blank_hsv(w: u32, h: u32) -> HsvImage {
        HsvImage::from_rgb(&RgbImage::from_pixel(w, h, Rgb([30, 60, 200])))
    }

    #[test]
    fn small_rectangle_contour() {
        let m = mask_with(5, 4, &[(1, 1, 4, 3)]);
        let contours = external_contours(&m);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.area(), 2.0);
        assert!((c.perimeter() - 6.0).abs() < 1e-9);
        assert_eq!(c.bounding_rect(), Rect::new(1, 1, 3, 2));
    }

    #[test]
    fn single_pixel_has_no_area() {
        let m = mask_with(3, 3, &[(1, 1, 2, 2)]);
        let contours = external_contours(&m);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 0.0);
        assert_eq!(contours[0].bounding_rect(), Rect::new(1, 1, 1, 1));
    }

    #[test]
    fn diagonal_pixels_are_one_component() {
        let m = mask_with(4, 4, &[(0, 0, 1, 1), (1, 1, 2, 2), (2, 2, 3, 3)]);
        let contours = external_contours(&m);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect(), Rect::new(0, 0, 3, 3));
    }

    #[test]
    fn blocks_on_the_image_edge_are_traced() {
        let m = mask_with(20, 10, &[(0, 2, 6, 8), (15, 0, 20, 10)]);
        let boxes: Vec<Rect> = external_contours(&m)
            .iter()
            .map(Contour::bounding_rect)
            .collect();
        assert_eq!(boxes.len(), 2);
        assert!(boxes.contains(&Rect::new(0, 2, 6, 6)));
        assert!(boxes.contains(&Rect::new(15, 0, 5, 10)));
    }

    #[test]
    fn component_in_hole_is_not_external() {
        let mut m = mask_with(30, 30, &[(0, 0, 30, 30)]);
        paint(&mut m, &[(5, 5, 25, 25)], 0);
        paint(&mut m, &[(12, 12, 16, 16)], 255);
        let contours = external_contours(&m);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect(), Rect::new(0, 0, 30, 30));
    }

    #[test]
    fn sparse_blobs_fail_the_extent_bound() {
        let filter = BlobFilter::default();
        let bbox = Rect::new(0, 0, 100, 80);
        // 2000 / 8000 = 0.25 < 0.3
        assert!(!filter.accepts(2000.0, &bbox, 400.0));
        assert!(filter.accepts(2400.0, &bbox, 400.0));
    }

    #[test]
    fn vehicle_sized_block_passes_filters() {
        let m = mask_with(200, 150, &[(50, 40, 150, 120)]);
        let found = extract(&m, &blank_hsv(200, 150), ColorClass::Blue, &BlobFilter::default(), None);
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!(d.bbox, Rect::new(50, 40, 100, 80));
        assert_eq!(d.centroid, Point::new(100, 80));
        assert_eq!(d.area, 99.0 * 79.0);
        assert!(d.extent > 0.95);
        assert!((d.perimeter - 356.0).abs() < 1e-9);
        assert!(d.mean_hsv.is_some());
    }

    #[test]
    fn small_and_elongated_blobs_are_rejected() {
        let filter = BlobFilter::default();
        let hsv = blank_hsv(400, 200);
        let small = mask_with(400, 200, &[(10, 10, 55, 38)]);
        assert!(extract(&small, &hsv, ColorClass::Blue, &filter, None).is_empty());
        // 250 x 50: aspect 5.0.
        let long = mask_with(400, 200, &[(10, 10, 260, 60)]);
        assert!(extract(&long, &hsv, ColorClass::Blue, &filter, None).is_empty());
    }

    #[test]
    fn centroid_outside_area_is_rejected() {
        let m = mask_with(300, 200, &[(150, 50, 250, 130)]);
        let area = ParkingArea::new([
            Point::new(0, 0),
            Point::new(150, 0),
            Point::new(150, 200),
            Point::new(0, 200),
        ]);
        let found = extract(&m, &blank_hsv(300, 200), ColorClass::Blue, &BlobFilter::default(), Some(&area));
        assert!(found.is_empty());
    }
}
