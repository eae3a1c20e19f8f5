//! Parking spot occupancy.
//!
//! Occupancy is recomputed from scratch every frame: all spots are cleared,
//! then each vehicle marks the first spot (in configured order) whose
//! rectangle contains its centroid, edges included.

use serde::{Deserialize, Serialize};

use crate::detect::ColorClass;
use crate::geometry::{Point, Rect};
use crate::track::{TrackedVehicle, VehicleId};

/// Static spot layout entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotConfig {
    pub id: u32,
    pub bbox: Rect,
    /// Label anchor; defaults to the rectangle center.
    #[serde(default)]
    pub center: Option<Point>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: u32,
    pub bbox: Rect,
    pub center: Point,
    pub occupied: bool,
    pub vehicle_id: Option<VehicleId>,
    pub vehicle_color: Option<ColorClass>,
}

impl ParkingSpot {
    pub fn new(id: u32, bbox: Rect) -> Self {
        Self {
            id,
            bbox,
            center: bbox.center(),
            occupied: false,
            vehicle_id: None,
            vehicle_color: None,
        }
    }

    fn clear(&mut self) {
        self.occupied = false;
        self.vehicle_id = None;
        self.vehicle_color = None;
    }
}

impl From<&SpotConfig> for ParkingSpot {
    fn from(cfg: &SpotConfig) -> Self {
        let mut spot = ParkingSpot::new(cfg.id, cfg.bbox);
        if let Some(center) = cfg.center {
            spot.center = center;
        }
        spot
    }
}

pub struct OccupancyEngine {
    spots: Vec<ParkingSpot>,
}

impl OccupancyEngine {
    pub fn new(spots: Vec<ParkingSpot>) -> Self {
        Self { spots }
    }

    pub fn from_config(spots: &[SpotConfig]) -> Self {
        Self::new(spots.iter().map(ParkingSpot::from).collect())
    }

    pub fn update(&mut self, vehicles: &[TrackedVehicle]) -> &[ParkingSpot] {
        for spot in &mut self.spots {
            spot.clear();
        }
        for vehicle in vehicles {
            let pos = vehicle.position();
            if let Some(spot) = self.spots.iter_mut().find(|s| s.bbox.contains(pos)) {
                spot.occupied = true;
                spot.vehicle_id = Some(vehicle.id);
                spot.vehicle_color = Some(vehicle.color());
            }
        }
        &self.spots
    }

    pub fn spots(&self) -> &[ParkingSpot] {
        &self.spots
    }

    pub fn occupied_count(&self) -> usize {
        self.spots.iter().filter(|s| s.occupied).count()
    }
}
