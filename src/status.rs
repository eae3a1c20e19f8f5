//! Status document for external readers (dashboards, `parkwatch_status`).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::alert::AlertStatus;
use crate::config::ParkwatchConfig;
use crate::detect::ColorClass;
use crate::geometry::Point;
use crate::monitor::Snapshot;
use crate::proximity::Warning;
use crate::track::VehicleId;

/// A monitor that has not published for this long is reported inactive.
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotStatus {
    pub id: u32,
    pub occupied: bool,
    pub vehicle_id: Option<VehicleId>,
    pub vehicle_color: Option<ColorClass>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: Liveness,
    pub resolution: [u32; 2],
    pub fps: u32,
    pub frame_count: u64,
    pub skipped_cycles: u64,
    pub total_vehicles: usize,
    pub vehicles_by_color: BTreeMap<ColorClass, usize>,
    pub occupied_spots: usize,
    pub parking_status: Vec<SpotStatus>,
    pub parking_area: Option<Vec<Point>>,
    pub active_warnings: usize,
    pub warnings: Vec<Warning>,
    pub alert: Option<AlertStatus>,
}

impl StatusReport {
    /// Build the document from the latest snapshot (if any) as of `now`.
    pub fn build(snapshot: Option<&Snapshot>, cfg: &ParkwatchConfig, now: Instant) -> Self {
        let mut vehicles_by_color: BTreeMap<ColorClass, usize> =
            cfg.colors.iter().map(|p| (p.class, 0)).collect();

        let Some(snap) = snapshot else {
            return Self {
                status: Liveness::Inactive,
                resolution: [cfg.capture.width, cfg.capture.height],
                fps: cfg.capture.fps,
                frame_count: 0,
                skipped_cycles: 0,
                total_vehicles: 0,
                vehicles_by_color,
                occupied_spots: 0,
                parking_status: cfg
                    .parking_spots
                    .iter()
                    .map(|s| SpotStatus {
                        id: s.id,
                        occupied: false,
                        vehicle_id: None,
                        vehicle_color: None,
                    })
                    .collect(),
                parking_area: cfg.parking_area.as_ref().map(|a| a.corners().to_vec()),
                active_warnings: 0,
                warnings: Vec::new(),
                alert: None,
            };
        };

        let report = &snap.report;
        for v in &report.vehicles {
            *vehicles_by_color.entry(v.color()).or_insert(0) += 1;
        }
        let status = if now.saturating_duration_since(snap.updated_at) < ACTIVE_WINDOW {
            Liveness::Active
        } else {
            Liveness::Inactive
        };

        Self {
            status,
            resolution: [cfg.capture.width, cfg.capture.height],
            fps: cfg.capture.fps,
            frame_count: snap.frames_processed,
            skipped_cycles: snap.skipped_cycles,
            total_vehicles: report.vehicles.len(),
            vehicles_by_color,
            occupied_spots: report.occupied_spots(),
            parking_status: report
                .spots
                .iter()
                .map(|s| SpotStatus {
                    id: s.id,
                    occupied: s.occupied,
                    vehicle_id: s.vehicle_id,
                    vehicle_color: s.vehicle_color,
                })
                .collect(),
            parking_area: report.overlay.parking_area.map(|c| c.to_vec()),
            active_warnings: report.warnings.len(),
            warnings: report.warnings.clone(),
            alert: Some(report.alert.clone()),
        }
    }

    /// One-line summary for the periodic status log.
    pub fn summary_line(&self) -> String {
        let colors: Vec<String> = self
            .vehicles_by_color
            .iter()
            .map(|(c, n)| format!("{c}={n}"))
            .collect();
        let collisions = self.warnings.iter().filter(|w| w.is_collision()).count();
        format!(
            "frame {}: vehicles {} ({}), spots {}/{}, sensor warnings {}, collision warnings {}",
            self.frame_count,
            self.total_vehicles,
            colors.join(" "),
            self.occupied_spots,
            self.parking_status.len(),
            self.active_warnings - collisions,
            collisions
        )
    }
}
