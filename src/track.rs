//! Frame-to-frame vehicle identity.
//!
//! Each detection is matched against the previous frame's vehicles of the same
//! color: the nearest one strictly inside the tracking radius lends its id and
//! position history. Detections are matched independently, so two detections
//! may claim the same previous vehicle. Unmatched detections get a fresh id;
//! previous vehicles that nobody claimed are forgotten.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::detect::{ColorClass, Detection};
use crate::geometry::Point;

/// Positions kept per vehicle, newest last.
pub const HISTORY_LEN: usize = 10;
/// Default matching radius, px.
pub const DEFAULT_TRACKING_RADIUS: f64 = 100.0;

pub type VehicleId = u64;

/// A detection with an identity attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedVehicle {
    pub id: VehicleId,
    pub detection: Detection,
    pub history: VecDeque<Point>,
}

impl TrackedVehicle {
    pub fn color(&self) -> ColorClass {
        self.detection.color
    }

    pub fn position(&self) -> Point {
        self.detection.centroid
    }
}

pub struct Tracker {
    previous: Vec<TrackedVehicle>,
    next_id: VehicleId,
    radius: f64,
    history_len: usize,
}

impl Tracker {
    pub fn new(radius: f64) -> Self {
        Self::with_history(radius, HISTORY_LEN)
    }

    pub fn with_history(radius: f64, history_len: usize) -> Self {
        Self {
            previous: Vec::new(),
            next_id: 1,
            radius,
            history_len: history_len.max(1),
        }
    }

    /// Resume from known state (e.g. a replayed session).
    pub fn with_state(
        radius: f64,
        history_len: usize,
        mut previous: Vec<TrackedVehicle>,
        next_id: VehicleId,
    ) -> Self {
        let history_len = history_len.max(1);
        for vehicle in &mut previous {
            while vehicle.history.len() > history_len {
                vehicle.history.pop_front();
            }
        }
        Self {
            previous,
            next_id,
            radius,
            history_len,
        }
    }

    pub fn next_id(&self) -> VehicleId {
        self.next_id
    }

    pub fn vehicles(&self) -> &[TrackedVehicle] {
        &self.previous
    }

    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<TrackedVehicle> {
        let mut tracked = Vec::with_capacity(detections.len());

        for detection in detections {
            let mut best: Option<&TrackedVehicle> = None;
            let mut best_dist = f64::INFINITY;
            for prev in &self.previous {
                if prev.color() != detection.color {
                    continue;
                }
                let dist = detection.centroid.distance_to(prev.position());
                if dist < self.radius && dist < best_dist {
                    best_dist = dist;
                    best = Some(prev);
                }
            }

            let vehicle = match best {
                Some(prev) => {
                    let mut history = prev.history.clone();
                    history.push_back(detection.centroid);
                    while history.len() > self.history_len {
                        history.pop_front();
                    }
                    TrackedVehicle {
                        id: prev.id,
                        detection,
                        history,
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    log::info!(
                        "new {} vehicle: id {} at ({}, {})",
                        detection.color,
                        id,
                        detection.centroid.x,
                        detection.centroid.y
                    );
                    TrackedVehicle {
                        id,
                        history: VecDeque::from([detection.centroid]),
                        detection,
                    }
                }
            };
            tracked.push(vehicle);
        }

        self.previous = tracked.clone();
        tracked
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKING_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn det(color: ColorClass, cx: i32, cy: i32) -> Detection {
        Detection::from_box(color, Rect::new(cx - 50, cy - 40, 100, 80))
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut tracker = Tracker::default();
        let out = tracker.update(vec![
            det(ColorClass::Blue, 100, 100),
            det(ColorClass::Yellow, 400, 100),
        ]);
        assert_eq!(out[0].id, 1);
        assert_eq!(out[1].id, 2);
        assert_eq!(tracker.next_id(), 3);
    }

    #[test]
    fn nearby_same_color_keeps_id() {
        let mut tracker = Tracker::default();
        tracker.update(vec![det(ColorClass::Blue, 100, 100)]);
        let out = tracker.update(vec![det(ColorClass::Blue, 150, 100)]);
        assert_eq!(out[0].id, 1);
        assert_eq!(
            out[0].history.iter().copied().collect::<Vec<_>>(),
            vec![Point::new(100, 100), Point::new(150, 100)]
        );
    }

    #[test]
    fn color_change_gets_new_id() {
        let mut tracker = Tracker::default();
        tracker.update(vec![det(ColorClass::Blue, 100, 100)]);
        let out = tracker.update(vec![det(ColorClass::Yellow, 100, 100)]);
        assert_eq!(out[0].id, 2);
        assert_eq!(out[0].history.len(), 1);
    }

    #[test]
    fn jump_beyond_radius_gets_new_id() {
        let mut tracker = Tracker::default();
        tracker.update(vec![det(ColorClass::Blue, 100, 100)]);
        let out = tracker.update(vec![det(ColorClass::Blue, 200, 100)]);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn nearest_previous_wins() {
        let mut tracker = Tracker::default();
        tracker.update(vec![
            det(ColorClass::White, 100, 100),
            det(ColorClass::White, 300, 100),
        ]);
        let out = tracker.update(vec![det(ColorClass::White, 220, 100)]);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = Tracker::default();
        let mut last = Vec::new();
        for i in 0..25 {
            last = tracker.update(vec![det(ColorClass::Blue, 100 + i * 5, 100)]);
        }
        assert_eq!(last[0].id, 1);
        assert_eq!(last[0].history.len(), HISTORY_LEN);
        assert_eq!(*last[0].history.back().unwrap(), Point::new(220, 100));
    }

    #[test]
    fn lost_vehicle_is_forgotten() {
        let mut tracker = Tracker::default();
        tracker.update(vec![det(ColorClass::Blue, 100, 100)]);
        tracker.update(Vec::new());
        let out = tracker.update(vec![det(ColorClass::Blue, 100, 100)]);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn resumed_state_continues_numbering() {
        let mut seed = Tracker::default();
        let prev = seed.update(vec![det(ColorClass::Blue, 100, 100)]);
        let mut tracker = Tracker::with_state(DEFAULT_TRACKING_RADIUS, HISTORY_LEN, prev, 7);
        let out = tracker.update(vec![
            det(ColorClass::Blue, 110, 100),
            det(ColorClass::Blue, 600, 100),
        ]);
        assert_eq!(out[0].id, 1);
        assert_eq!(out[1].id, 7);
    }

    #[test]
    fn resumed_state_keeps_its_history_length() {
        let mut seed = Tracker::default();
        let mut prev = Vec::new();
        for i in 0..8 {
            prev = seed.update(vec![det(ColorClass::Yellow, 100 + i * 5, 100)]);
        }
        assert_eq!(prev[0].history.len(), 8);

        let mut tracker = Tracker::with_state(DEFAULT_TRACKING_RADIUS, 3, prev, 2);
        assert_eq!(tracker.vehicles()[0].history.len(), 3);
        let mut out = Vec::new();
        for i in 8..12 {
            out = tracker.update(vec![det(ColorClass::Yellow, 100 + i * 5, 100)]);
        }
        assert_eq!(out[0].id, 1);
        assert_eq!(out[0].history.len(), 3);
        assert_eq!(
            out[0].history.iter().copied().collect::<Vec<_>>(),
            vec![Point::new(145, 100), Point::new(150, 100), Point::new(155, 100)]
        );
    }
}
