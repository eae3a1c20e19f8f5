//! Proximity and collision warnings.
//!
//! For each vehicle in order: one warning per ultrasonic sensor closer than the
//! warning distance, then one per barrier. After all vehicles, one warning per
//! unordered vehicle pair closer than the collision distance. All comparisons
//! are strict. Sensor and barrier ids are 1-based positions in the configured lists.

use serde::{Deserialize, Serialize};

use crate::detect::ColorClass;
use crate::geometry::Point;
use crate::track::{TrackedVehicle, VehicleId};

pub const DEFAULT_WARNING_DISTANCE: f64 = 80.0;
pub const DEFAULT_COLLISION_DISTANCE: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// Vehicle near an ultrasonic sensor.
    SensorProximity {
        sensor_id: usize,
        vehicle_id: VehicleId,
        vehicle_color: ColorClass,
        vehicle_pos: Point,
        sensor_pos: Point,
        distance: f64,
    },
    /// Vehicle near a gate barrier.
    BarrierProximity {
        barrier_id: usize,
        vehicle_id: VehicleId,
        vehicle_color: ColorClass,
        vehicle_pos: Point,
        barrier_pos: Point,
        distance: f64,
    },
    /// Two vehicles too close to each other.
    Collision {
        vehicle1_id: VehicleId,
        vehicle1_color: ColorClass,
        vehicle1_pos: Point,
        vehicle2_id: VehicleId,
        vehicle2_color: ColorClass,
        vehicle2_pos: Point,
        distance: f64,
    },
}

impl Warning {
    pub fn is_collision(&self) -> bool {
        matches!(self, Warning::Collision { .. })
    }

    pub fn distance(&self) -> f64 {
        match self {
            Warning::SensorProximity { distance, .. }
            | Warning::BarrierProximity { distance, .. }
            | Warning::Collision { distance, .. } => *distance,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::SensorProximity {
                sensor_id,
                vehicle_id,
                vehicle_color,
                distance,
                ..
            } => write!(
                f,
                "sensor {sensor_id} <-> {vehicle_color} vehicle (id {vehicle_id}) {distance:.1}px"
            ),
            Warning::BarrierProximity {
                barrier_id,
                vehicle_id,
                vehicle_color,
                distance,
                ..
            } => write!(
                f,
                "barrier {barrier_id} <-> {vehicle_color} vehicle (id {vehicle_id}) {distance:.1}px"
            ),
            Warning::Collision {
                vehicle1_id,
                vehicle1_color,
                vehicle2_id,
                vehicle2_color,
                distance,
                ..
            } => write!(
                f,
                "collision {vehicle1_color} (id {vehicle1_id}) <-> {vehicle2_color} (id {vehicle2_id}) {distance:.1}px"
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProximityAnalyzer {
    sensors: Vec<Point>,
    barriers: Vec<Point>,
    warning_distance: f64,
    collision_distance: f64,
}

impl ProximityAnalyzer {
    pub fn new(
        sensors: Vec<Point>,
        barriers: Vec<Point>,
        warning_distance: f64,
        collision_distance: f64,
    ) -> Self {
        Self {
            sensors,
            barriers,
            warning_distance,
            collision_distance,
        }
    }

    pub fn sensors(&self) -> &[Point] {
        &self.sensors
    }

    pub fn barriers(&self) -> &[Point] {
        &self.barriers
    }

    pub fn analyze(&self, vehicles: &[TrackedVehicle]) -> Vec<Warning> {
        let mut warnings = Vec::new();

        for v in vehicles {
            let pos = v.position();
            for (i, &sensor) in self.sensors.iter().enumerate() {
                let distance = pos.distance_to(sensor);
                if distance < self.warning_distance {
                    warnings.push(Warning::SensorProximity {
                        sensor_id: i + 1,
                        vehicle_id: v.id,
                        vehicle_color: v.color(),
                        vehicle_pos: pos,
                        sensor_pos: sensor,
                        distance,
                    });
                }
            }
            for (i, &barrier) in self.barriers.iter().enumerate() {
                let distance = pos.distance_to(barrier);
                if distance < self.warning_distance {
                    warnings.push(Warning::BarrierProximity {
                        barrier_id: i + 1,
                        vehicle_id: v.id,
                        vehicle_color: v.color(),
                        vehicle_pos: pos,
                        barrier_pos: barrier,
                        distance,
                    });
                }
            }
        }

        for (i, a) in vehicles.iter().enumerate() {
            for b in &vehicles[i + 1..] {
                let distance = a.position().distance_to(b.position());
                if distance < self.collision_distance {
                    warnings.push(Warning::Collision {
                        vehicle1_id: a.id,
                        vehicle1_color: a.color(),
                        vehicle1_pos: a.position(),
                        vehicle2_id: b.id,
                        vehicle2_color: b.color(),
                        vehicle2_pos: b.position(),
                        distance,
                    });
                }
            }
        }

        warnings
    }
}
