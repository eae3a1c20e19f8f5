//! Same-color detection merging.
//!
//! A single car can split into several blobs (roof reflections, a pillar in
//! front of it). Each not-yet-grouped detection seeds a group and pulls in every
//! other ungrouped detection of its color whose centroid is within the radius
//! of the seed's centroid. Grouping is not transitive beyond the seed.

use crate::detect::result::Detection;

/// Default centroid radius for merging, px.
pub const DEFAULT_MERGE_RADIUS: f64 = 70.0;

pub fn merge_nearby(detections: Vec<Detection>, radius: f64) -> Vec<Detection> {
    if detections.len() <= 1 {
        return detections;
    }

    let mut used = vec![false; detections.len()];
    let mut merged = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let seed = &detections[i];
        let mut group = vec![i];

        for (j, other) in detections.iter().enumerate() {
            if used[j] {
                continue;
            }
            if other.color == seed.color && seed.centroid.distance_to(other.centroid) < radius {
                group.push(j);
                used[j] = true;
            }
        }

        if group.len() == 1 {
            merged.push(seed.clone());
        } else {
            let members: Vec<&Detection> = group.iter().map(|&k| &detections[k]).collect();
            merged.push(combine(&members));
        }
    }

    merged
}

fn combine(members: &[&Detection]) -> Detection {
    let first = members[0];
    let bbox = members[1..]
        .iter()
        .fold(first.bbox, |acc, d| acc.union(&d.bbox));
    let area: f64 = members.iter().map(|d| d.area).sum();
    let box_area = bbox.area().max(1) as f64;

    Detection {
        color: first.color,
        bbox,
        centroid: bbox.center(),
        area,
        aspect_ratio: bbox.w as f64 / bbox.h.max(1) as f64,
        extent: area / box_area,
        perimeter: members.iter().map(|d| d.perimeter).sum(),
        mean_hsv: None,
        merged_count: members.iter().map(|d| d.merged_count).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ColorClass;
    use crate::geometry::{Point, Rect};

    fn at(color: ColorClass, cx: i32, cy: i32) -> Detection {
        Detection::from_box(color, Rect::new(cx - 30, cy - 20, 60, 40))
    }

    #[test]
    fn close_same_color_blobs_merge() {
        let out = merge_nearby(
            vec![at(ColorClass::Blue, 100, 100), at(ColorClass::Blue, 130, 100)],
            DEFAULT_MERGE_RADIUS,
        );
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.merged_count, 2);
        assert_eq!(m.bbox, Rect::new(70, 80, 90, 40));
        assert_eq!(m.centroid, Point::new(115, 100));
        assert_eq!(m.area, 2.0 * 59.0 * 39.0);
        assert!(m.mean_hsv.is_none());
    }

    #[test]
    fn distant_blobs_stay_separate() {
        let out = merge_nearby(
            vec![at(ColorClass::Blue, 100, 100), at(ColorClass::Blue, 300, 100)],
            DEFAULT_MERGE_RADIUS,
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.merged_count == 1));
    }

    #[test]
    fn different_colors_never_merge() {
        let out = merge_nearby(
            vec![at(ColorClass::Blue, 100, 100), at(ColorClass::Yellow, 110, 100)],
            DEFAULT_MERGE_RADIUS,
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn grouping_is_measured_from_the_seed() {
        // b is near a and c, but c is too far from the seed a.
        let out = merge_nearby(
            vec![
                at(ColorClass::White, 100, 100),
                at(ColorClass::White, 160, 100),
                at(ColorClass::White, 220, 100),
            ],
            DEFAULT_MERGE_RADIUS,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].merged_count, 2);
        assert_eq!(out[1].centroid, Point::new(220, 100));
    }
}
