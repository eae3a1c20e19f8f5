//! Parking lot monitor
//!
//! Watches an overhead camera view of a small lot, finds colored vehicles,
//! and reports which spots are taken and which vehicles are getting too close
//! to a sensor, a barrier, or each other.
//!
//! # Pipeline
//!
//! Each cycle runs, in order:
//!
//! 1. `detect`: HSV segmentation per color class, morphology, blob filtering
//! 2. merging of same-color blobs that belong to one vehicle
//! 3. `track`: greedy nearest-neighbour identity assignment
//! 4. `occupancy`: one vehicle per spot, first spot containing its centroid
//! 5. `proximity`: sensor, barrier and vehicle-vehicle warnings
//! 6. `alert`: debounced LED/buzzer plus one ultrasonic ping per trigger
//!
//! # Module Structure
//!
//! - `frame`: captured frames and HSV conversion
//! - `ingest`: frame sources (synthetic `stub://` scene, still images)
//! - `monitor`: the per-frame pipeline and the published snapshot
//! - `status`: the status document served to readers
//! - `config`: file + environment configuration

pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod monitor;
pub mod occupancy;
pub mod proximity;
pub mod status;
pub mod track;

pub use alert::{AlertConfig, AlertState, AlertStateMachine, AlertStatus, Clock, Gpio};
pub use config::ParkwatchConfig;
pub use detect::{ColorClass, Detection, DetectorBackend, HsvBlobDetector};
pub use frame::Frame;
pub use geometry::{ParkingArea, Point, Rect};
pub use ingest::{CaptureConfig, FrameSource};
pub use monitor::{FrameReport, Monitor, Snapshot, SnapshotHandle};
pub use occupancy::{OccupancyEngine, ParkingSpot, SpotConfig};
pub use proximity::{ProximityAnalyzer, Warning};
pub use status::StatusReport;
pub use track::{TrackedVehicle, Tracker, VehicleId};
