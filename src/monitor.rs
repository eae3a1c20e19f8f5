//! Per-frame pipeline: detect, merge, track, occupancy, proximity, alert.
//!
//! `Monitor::process_frame` never fails. A backend error costs the cycle its
//! detections and is logged; the rest of the pipeline still runs on the empty
//! list so occupancy and the alert state stay consistent. Each finished cycle
//! replaces the published snapshot under one lock.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::alert::{AlertStateMachine, AlertStatus, Clock, Gpio};
use crate::config::ParkwatchConfig;
use crate::detect::{merge_nearby, DetectorBackend, HsvBlobDetector};
use crate::frame::Frame;
use crate::geometry::{ParkingArea, Point};
use crate::occupancy::{OccupancyEngine, ParkingSpot};
use crate::proximity::{ProximityAnalyzer, Warning};
use crate::track::{TrackedVehicle, Tracker, VehicleId};

/// Everything one cycle produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub vehicles: Vec<TrackedVehicle>,
    pub spots: Vec<ParkingSpot>,
    pub warnings: Vec<Warning>,
    pub alert: AlertStatus,
    pub overlay: Overlay,
}

impl FrameReport {
    pub fn occupied_spots(&self) -> usize {
        self.spots.iter().filter(|s| s.occupied).count()
    }

    pub fn collision_count(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_collision()).count()
    }
}

/// Drawing data for an external renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub parking_area: Option<[Point; 4]>,
    pub sensors: Vec<Point>,
    pub barriers: Vec<Point>,
    /// One segment per warning: vehicle to sensor/barrier, or vehicle to vehicle.
    pub warning_lines: Vec<(Point, Point)>,
    /// Distance from each vehicle to the nearest parking-area edge; empty without an area.
    pub boundary_distances: Vec<(VehicleId, f64)>,
}

/// Latest published cycle plus counters, as seen by readers.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub report: FrameReport,
    pub updated_at: Instant,
    pub frames_processed: u64,
    pub skipped_cycles: u64,
}

/// Cloneable read side of the monitor's published state.
#[derive(Clone, Debug, Default)]
pub struct SnapshotHandle {
    inner: Arc<Mutex<Option<Snapshot>>>,
}

impl SnapshotHandle {
    /// Copy of the latest snapshot; `None` before the first processed frame.
    pub fn latest(&self) -> Option<Snapshot> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }

    fn note_skip(&self, skipped_cycles: u64) {
        if let Some(s) = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_mut()
        {
            s.skipped_cycles = skipped_cycles;
        }
    }
}

pub struct Monitor {
    backend: Box<dyn DetectorBackend>,
    merge_distance: f64,
    tracker: Tracker,
    occupancy: OccupancyEngine,
    proximity: ProximityAnalyzer,
    alert: AlertStateMachine,
    parking_area: Option<ParkingArea>,
    snapshot: SnapshotHandle,
    frames_processed: u64,
    skipped_cycles: u64,
}

impl Monitor {
    pub fn new(
        cfg: &ParkwatchConfig,
        backend: Box<dyn DetectorBackend>,
        gpio: Box<dyn Gpio>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            merge_distance: cfg.detection.merge_distance,
            tracker: Tracker::with_history(cfg.tracking.distance, cfg.tracking.history_len),
            occupancy: OccupancyEngine::from_config(&cfg.parking_spots),
            proximity: ProximityAnalyzer::new(
                cfg.sensors.clone(),
                cfg.barriers.clone(),
                cfg.proximity.warning_distance,
                cfg.proximity.collision_distance,
            ),
            alert: AlertStateMachine::new(gpio, clock, cfg.alert.to_alert_config()),
            parking_area: cfg.parking_area.clone(),
            snapshot: SnapshotHandle::default(),
            frames_processed: 0,
            skipped_cycles: 0,
        }
    }

    /// Monitor with the HSV color detector configured from `cfg`.
    pub fn from_config(cfg: &ParkwatchConfig, gpio: Box<dyn Gpio>, clock: Arc<dyn Clock>) -> Self {
        let backend = HsvBlobDetector::new(cfg.colors.clone(), cfg.detection.blob_filter.clone())
            .with_kernels(cfg.detection.open_kernel, cfg.detection.close_kernel);
        Self::new(cfg, Box::new(backend), gpio, clock)
    }

    pub fn handle(&self) -> SnapshotHandle {
        self.snapshot.clone()
    }

    pub fn parking_area(&self) -> Option<&ParkingArea> {
        self.parking_area.as_ref()
    }

    /// Replace the lot outline; takes effect from the next frame.
    pub fn set_parking_area(&mut self, area: Option<ParkingArea>) {
        match &area {
            Some(a) => log::info!("parking area set: {:?}", a.corners()),
            None => log::info!("parking area cleared; detecting over the full frame"),
        }
        self.parking_area = area;
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles
    }

    pub fn warm_up(&mut self) {
        if let Err(e) = self.backend.warm_up() {
            log::warn!("detector {} warm-up failed: {:#}", self.backend.name(), e);
        }
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let raw = match self.backend.detect(frame, self.parking_area.as_ref()) {
            Ok(found) => found,
            Err(e) => {
                log::warn!(
                    "frame {}: detector {} failed: {:#}",
                    frame.index,
                    self.backend.name(),
                    e
                );
                Vec::new()
            }
        };
        let raw_count = raw.len();
        let merged = merge_nearby(raw, self.merge_distance);
        let vehicles = self.tracker.update(merged);
        let spots = self.occupancy.update(&vehicles).to_vec();
        let warnings = self.proximity.analyze(&vehicles);
        let alert = self.alert.update(&warnings);

        log::debug!(
            "frame {}: {} blob(s), {} vehicle(s), {} warning(s)",
            frame.index,
            raw_count,
            vehicles.len(),
            warnings.len()
        );

        let overlay = self.overlay(&vehicles, &warnings);
        let report = FrameReport {
            frame_index: frame.index,
            vehicles,
            spots,
            warnings,
            alert,
            overlay,
        };

        self.frames_processed += 1;
        self.snapshot.publish(Snapshot {
            report: report.clone(),
            updated_at: Instant::now(),
            frames_processed: self.frames_processed,
            skipped_cycles: self.skipped_cycles,
        });
        report
    }

    /// A cycle without a frame: tracked state is kept, the auto-off deadline is still serviced.
    pub fn skip_cycle(&mut self) -> AlertStatus {
        self.skipped_cycles += 1;
        self.snapshot.note_skip(self.skipped_cycles);
        self.alert.poll()
    }

    /// Actuators off; call before exit.
    pub fn shutdown(&mut self) {
        self.alert.shutdown();
        log::info!(
            "monitor stopped after {} frame(s), {} skipped cycle(s)",
            self.frames_processed,
            self.skipped_cycles
        );
    }

    fn overlay(&self, vehicles: &[TrackedVehicle], warnings: &[Warning]) -> Overlay {
        let warning_lines = warnings
            .iter()
            .map(|w| match w {
                Warning::SensorProximity {
                    vehicle_pos,
                    sensor_pos,
                    ..
                } => (*vehicle_pos, *sensor_pos),
                Warning::BarrierProximity {
                    vehicle_pos,
                    barrier_pos,
                    ..
                } => (*vehicle_pos, *barrier_pos),
                Warning::Collision {
                    vehicle1_pos,
                    vehicle2_pos,
                    ..
                } => (*vehicle1_pos, *vehicle2_pos),
            })
            .collect();

        let boundary_distances = match &self.parking_area {
            Some(area) => vehicles
                .iter()
                .map(|v| (v.id, area.distance_to_boundary(v.position())))
                .collect(),
            None => Vec::new(),
        };

        Overlay {
            parking_area: self.parking_area.as_ref().map(|a| *a.corners()),
            sensors: self.proximity.sensors().to_vec(),
            barriers: self.proximity.barriers().to_vec(),
            warning_lines,
            boundary_distances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{ManualClock, SimulatedGpio};
    use crate::detect::{ColorClass, Detection, ScriptedBackend};
    use crate::geometry::Rect;
    use anyhow::anyhow;
    use image::RgbImage;

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(
            &mut self,
            _frame: &Frame,
            _area: Option<&ParkingArea>,
        ) -> anyhow::Result<Vec<Detection>> {
            Err(anyhow!("sensor glitch"))
        }
    }

    fn car(color: ColorClass, cx: i32, cy: i32) -> Detection {
        Detection::from_box(color, Rect::new(cx - 50, cy - 40, 100, 80))
    }

    fn monitor(backend: Box<dyn DetectorBackend>) -> (Monitor, ManualClock) {
        let clock = ManualClock::new();
        let gpio = SimulatedGpio::silent(clock.clone());
        let m = Monitor::new(
            &ParkwatchConfig::default(),
            backend,
            Box::new(gpio),
            Arc::new(clock.clone()),
        );
        (m, clock)
    }

    fn blank(index: u64) -> Frame {
        Frame::new(RgbImage::new(8, 8), index)
    }

    #[test]
    fn parked_car_occupies_spot_one() {
        let backend = ScriptedBackend::constant(vec![car(ColorClass::Blue, 423, 188)]);
        let (mut m, _) = monitor(Box::new(backend));
        let report = m.process_frame(&blank(0));
        assert_eq!(report.vehicles.len(), 1);
        assert_eq!(report.spots[0].vehicle_id, Some(1));
        assert_eq!(report.spots[0].vehicle_color, Some(ColorClass::Blue));
        assert_eq!(report.occupied_spots(), 1);
        assert!(report.warnings.is_empty());
        assert_eq!(report.overlay.boundary_distances.len(), 1);
    }

    #[test]
    fn split_blobs_become_one_vehicle() {
        let backend = ScriptedBackend::constant(vec![
            car(ColorClass::Yellow, 550, 170),
            car(ColorClass::Yellow, 560, 210),
        ]);
        let (mut m, _) = monitor(Box::new(backend));
        let report = m.process_frame(&blank(0));
        assert_eq!(report.vehicles.len(), 1);
        assert_eq!(report.vehicles[0].detection.merged_count, 2);
    }

    #[test]
    fn detector_failure_yields_empty_cycle() {
        let (mut m, _) = monitor(Box::new(FailingBackend));
        let report = m.process_frame(&blank(3));
        assert_eq!(report.frame_index, 3);
        assert!(report.vehicles.is_empty());
        assert_eq!(report.occupied_spots(), 0);
        assert_eq!(m.frames_processed(), 1);
    }

    #[test]
    fn skipped_cycle_keeps_identities_and_fires_auto_off() {
        let backend = ScriptedBackend::constant(vec![car(ColorClass::White, 250, 640)]);
        let (mut m, clock) = monitor(Box::new(backend));
        let first = m.process_frame(&blank(0));
        assert!(first.alert.triggered);

        clock.set(std::time::Duration::from_millis(900));
        let status = m.skip_cycle();
        assert!(!status.actuators_on);
        assert_eq!(m.skipped_cycles(), 1);

        let next = m.process_frame(&blank(1));
        assert_eq!(next.vehicles[0].id, first.vehicles[0].id);
        assert_eq!(m.handle().latest().unwrap().skipped_cycles, 1);
    }

    #[test]
    fn clearing_area_disables_boundary_data() {
        let backend = ScriptedBackend::constant(vec![car(ColorClass::Blue, 100, 100)]);
        let (mut m, _) = monitor(Box::new(backend));
        assert!(m.process_frame(&blank(0)).vehicles.is_empty());

        m.set_parking_area(None);
        let report = m.process_frame(&blank(1));
        assert_eq!(report.vehicles.len(), 1);
        assert!(report.overlay.parking_area.is_none());
        assert!(report.overlay.boundary_distances.is_empty());
    }

    #[test]
    fn warning_lines_follow_warnings() {
        let backend = ScriptedBackend::constant(vec![
            car(ColorClass::Blue, 500, 300),
            car(ColorClass::Yellow, 580, 300),
        ]);
        let (mut m, _) = monitor(Box::new(backend));
        let report = m.process_frame(&blank(0));
        assert_eq!(report.collision_count(), 1);
        assert_eq!(
            report.overlay.warning_lines,
            vec![(Point::new(500, 300), Point::new(580, 300))]
        );
    }
}
