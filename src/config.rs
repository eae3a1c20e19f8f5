use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::alert::{
    AlertConfig, GpioPins, RangingConfig, DEFAULT_AUTO_OFF, DEFAULT_COOLDOWN, ECHO_TIMEOUT,
    SPEED_FACTOR_CM_PER_S,
};
use crate::detect::segment::MAX_KERNEL;
use crate::detect::{BlobFilter, ColorClass, ColorProfile, HsvRange};
use crate::geometry::{ParkingArea, Point, Rect};
use crate::ingest::CaptureConfig;
use crate::occupancy::SpotConfig;

const DEFAULT_PARKING_AREA: [[i32; 2]; 4] = [[205, 17], [997, 13], [1031, 695], [209, 717]];
const DEFAULT_SPOTS: [[i32; 4]; 8] = [
    [366, 125, 114, 126],
    [480, 125, 141, 126],
    [621, 125, 112, 126],
    [733, 125, 118, 126],
    [372, 389, 121, 148],
    [493, 389, 125, 148],
    [618, 389, 115, 148],
    [733, 389, 126, 148],
];
const DEFAULT_SENSORS: [[i32; 2]; 4] = [[237, 671], [267, 60], [1025, 109], [940, 54]];
const DEFAULT_BARRIERS: [[i32; 2]; 2] = [[1062, 654], [959, 386]];
const DEFAULT_OPEN_KERNEL: u32 = 5;
const DEFAULT_CLOSE_KERNEL: u32 = 8;
const DEFAULT_MERGE_DISTANCE: f64 = 70.0;
const DEFAULT_TRACKING_DISTANCE: f64 = 100.0;
const DEFAULT_HISTORY_LEN: usize = 10;
const DEFAULT_WARNING_DISTANCE: f64 = 80.0;
const DEFAULT_COLLISION_DISTANCE: f64 = 100.0;
const DEFAULT_STATUS_LOG_INTERVAL: u64 = 60;

#[derive(Debug, Deserialize, Default)]
struct ParkwatchConfigFile {
    capture: Option<CaptureConfigFile>,
    /// Empty list = no parking area.
    parking_area: Option<Vec<[i32; 2]>>,
    parking_spots: Option<Vec<SpotFile>>,
    sensors: Option<Vec<[i32; 2]>>,
    barriers: Option<Vec<[i32; 2]>>,
    colors: Option<Vec<ColorFile>>,
    detection: Option<DetectionConfigFile>,
    tracking: Option<TrackingConfigFile>,
    proximity: Option<ProximityConfigFile>,
    alert: Option<AlertConfigFile>,
    gpio: Option<GpioPins>,
    status_log_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SpotFile {
    id: u32,
    bbox: [i32; 4],
    center: Option<[i32; 2]>,
}

#[derive(Debug, Deserialize)]
struct ColorFile {
    class: ColorClass,
    lower: [u8; 3],
    upper: [u8; 3],
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    blob_filter: Option<BlobFilter>,
    open_kernel: Option<u32>,
    close_kernel: Option<u32>,
    merge_distance: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    distance: Option<f64>,
    history_len: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ProximityConfigFile {
    warning_distance: Option<f64>,
    collision_distance: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<f64>,
    auto_off_secs: Option<f64>,
    echo_timeout_ms: Option<u64>,
    speed_factor: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ParkwatchConfig {
    pub capture: CaptureConfig,
    /// `None` until the lot outline is configured; detection then covers the whole frame.
    pub parking_area: Option<ParkingArea>,
    pub parking_spots: Vec<SpotConfig>,
    pub sensors: Vec<Point>,
    pub barriers: Vec<Point>,
    pub colors: Vec<ColorProfile>,
    pub detection: DetectionSettings,
    pub tracking: TrackingSettings,
    pub proximity: ProximitySettings,
    pub alert: AlertSettings,
    pub gpio: GpioPins,
    /// Frames between periodic status log lines.
    pub status_log_interval: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub blob_filter: BlobFilter,
    pub open_kernel: u32,
    pub close_kernel: u32,
    pub merge_distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub distance: f64,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySettings {
    pub warning_distance: f64,
    pub collision_distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    pub cooldown: Duration,
    pub auto_off: Duration,
    pub echo_timeout: Duration,
    pub speed_factor: f64,
}

impl AlertSettings {
    pub fn to_alert_config(&self) -> AlertConfig {
        AlertConfig {
            cooldown: self.cooldown,
            auto_off: self.auto_off,
            ranging: RangingConfig {
                timeout: self.echo_timeout,
                speed_factor: self.speed_factor,
            },
        }
    }
}

impl Default for ParkwatchConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            parking_area: Some(ParkingArea::new(DEFAULT_PARKING_AREA.map(Point::from))),
            parking_spots: DEFAULT_SPOTS
                .iter()
                .enumerate()
                .map(|(i, &bbox)| SpotConfig {
                    id: i as u32 + 1,
                    bbox: Rect::from(bbox),
                    center: None,
                })
                .collect(),
            sensors: points_from(&DEFAULT_SENSORS),
            barriers: points_from(&DEFAULT_BARRIERS),
            colors: ColorProfile::defaults(),
            detection: DetectionSettings {
                blob_filter: BlobFilter::default(),
                open_kernel: DEFAULT_OPEN_KERNEL,
                close_kernel: DEFAULT_CLOSE_KERNEL,
                merge_distance: DEFAULT_MERGE_DISTANCE,
            },
            tracking: TrackingSettings {
                distance: DEFAULT_TRACKING_DISTANCE,
                history_len: DEFAULT_HISTORY_LEN,
            },
            proximity: ProximitySettings {
                warning_distance: DEFAULT_WARNING_DISTANCE,
                collision_distance: DEFAULT_COLLISION_DISTANCE,
            },
            alert: AlertSettings {
                cooldown: DEFAULT_COOLDOWN,
                auto_off: DEFAULT_AUTO_OFF,
                echo_timeout: ECHO_TIMEOUT,
                speed_factor: SPEED_FACTOR_CM_PER_S,
            },
            gpio: GpioPins::default(),
            status_log_interval: DEFAULT_STATUS_LOG_INTERVAL,
        }
    }
}

impl ParkwatchConfig {
    /// Defaults, then the file named by `PARKWATCH_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like `load`, but an explicit `path` wins over `PARKWATCH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PARKWATCH_CONFIG").ok();
        let config_path = path.or(env_path.as_deref().map(Path::new));
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkwatchConfigFile) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(capture) = file.capture {
            if let Some(source) = capture.source {
                cfg.capture.source = source;
            }
            cfg.capture.width = capture.width.unwrap_or(cfg.capture.width);
            cfg.capture.height = capture.height.unwrap_or(cfg.capture.height);
            cfg.capture.fps = capture.fps.unwrap_or(cfg.capture.fps);
        }

        match file.parking_area {
            None => {}
            Some(points) if points.is_empty() => cfg.parking_area = None,
            Some(points) => cfg.parking_area = Some(ParkingArea::from_points(&points_from(&points))?),
        }

        if let Some(spots) = file.parking_spots {
            cfg.parking_spots = spots
                .into_iter()
                .map(|s| SpotConfig {
                    id: s.id,
                    bbox: Rect::from(s.bbox),
                    center: s.center.map(Point::from),
                })
                .collect();
        }
        if let Some(sensors) = file.sensors {
            cfg.sensors = points_from(&sensors);
        }
        if let Some(barriers) = file.barriers {
            cfg.barriers = points_from(&barriers);
        }
        if let Some(colors) = file.colors {
            cfg.colors = colors
                .into_iter()
                .map(|c| ColorProfile {
                    class: c.class,
                    range: HsvRange::new(c.lower, c.upper),
                })
                .collect();
        }

        if let Some(detection) = file.detection {
            if let Some(filter) = detection.blob_filter {
                cfg.detection.blob_filter = filter;
            }
            cfg.detection.open_kernel = detection.open_kernel.unwrap_or(cfg.detection.open_kernel);
            cfg.detection.close_kernel = detection.close_kernel.unwrap_or(cfg.detection.close_kernel);
            cfg.detection.merge_distance = detection
                .merge_distance
                .unwrap_or(cfg.detection.merge_distance);
        }
        if let Some(tracking) = file.tracking {
            cfg.tracking.distance = tracking.distance.unwrap_or(cfg.tracking.distance);
            cfg.tracking.history_len = tracking.history_len.unwrap_or(cfg.tracking.history_len);
        }
        if let Some(proximity) = file.proximity {
            cfg.proximity.warning_distance = proximity
                .warning_distance
                .unwrap_or(cfg.proximity.warning_distance);
            cfg.proximity.collision_distance = proximity
                .collision_distance
                .unwrap_or(cfg.proximity.collision_distance);
        }
        if let Some(alert) = file.alert {
            if let Some(v) = alert.cooldown_secs {
                cfg.alert.cooldown = secs(v, "cooldown_secs")?;
            }
            if let Some(v) = alert.auto_off_secs {
                cfg.alert.auto_off = secs(v, "auto_off_secs")?;
            }
            if let Some(ms) = alert.echo_timeout_ms {
                cfg.alert.echo_timeout = Duration::from_millis(ms);
            }
            cfg.alert.speed_factor = alert.speed_factor.unwrap_or(cfg.alert.speed_factor);
        }
        if let Some(gpio) = file.gpio {
            cfg.gpio = gpio;
        }
        cfg.status_log_interval = file
            .status_log_interval
            .unwrap_or(cfg.status_log_interval);

        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("PARKWATCH_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source.trim().to_string();
            }
        }
        if let Ok(fps) = std::env::var("PARKWATCH_FPS") {
            self.capture.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_FPS must be a positive integer"))?;
        }
        if let Ok(area) = std::env::var("PARKWATCH_PARKING_AREA") {
            self.parking_area = parse_area(&area)?;
        }
        if let Ok(distance) = std::env::var("PARKWATCH_WARNING_DISTANCE") {
            self.proximity.warning_distance = distance
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_WARNING_DISTANCE must be a number of pixels"))?;
        }
        if let Ok(distance) = std::env::var("PARKWATCH_COLLISION_DISTANCE") {
            self.proximity.collision_distance = distance
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKWATCH_COLLISION_DISTANCE must be a number of pixels"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.source.trim().is_empty() {
            return Err(anyhow!("capture source must not be empty"));
        }
        if self.capture.fps == 0 {
            return Err(anyhow!("capture fps must be greater than zero"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture size must be non-zero"));
        }

        let mut ids = HashSet::new();
        for spot in &self.parking_spots {
            if spot.id == 0 {
                return Err(anyhow!("parking spot ids start at 1"));
            }
            if !ids.insert(spot.id) {
                return Err(anyhow!("duplicate parking spot id {}", spot.id));
            }
            if spot.bbox.w <= 0 || spot.bbox.h <= 0 {
                return Err(anyhow!("parking spot {} has an empty rectangle", spot.id));
            }
        }

        if self.colors.is_empty() {
            return Err(anyhow!("at least one color class must be configured"));
        }
        for profile in &self.colors {
            if !profile.range.is_valid() {
                return Err(anyhow!(
                    "color {}: lower bound exceeds upper bound",
                    profile.class
                ));
            }
        }

        let f = &self.detection.blob_filter;
        if f.min_width > f.max_width || f.min_height > f.max_height || f.min_aspect > f.max_aspect {
            return Err(anyhow!("blob filter minimum exceeds its maximum"));
        }
        for kernel in [self.detection.open_kernel, self.detection.close_kernel] {
            if kernel == 0 || kernel > MAX_KERNEL {
                return Err(anyhow!(
                    "morphology kernel size {} outside 1..={}",
                    kernel,
                    MAX_KERNEL
                ));
            }
        }
        for (name, value) in [
            ("merge distance", self.detection.merge_distance),
            ("tracking distance", self.tracking.distance),
            ("warning distance", self.proximity.warning_distance),
            ("collision distance", self.proximity.collision_distance),
            ("speed factor", self.alert.speed_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} must be greater than zero", name));
            }
        }
        if self.tracking.history_len == 0 {
            return Err(anyhow!("tracking history length must be greater than zero"));
        }
        if self.alert.echo_timeout.is_zero() {
            return Err(anyhow!("echo timeout must be greater than zero"));
        }
        if self.status_log_interval == 0 {
            return Err(anyhow!("status log interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ParkwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn points_from(raw: &[[i32; 2]]) -> Vec<Point> {
    raw.iter().copied().map(Point::from).collect()
}

fn secs(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds", name))
}

/// `x,y;x,y;x,y;x,y`, or `none` / empty to clear the area.
fn parse_area(value: &str) -> Result<Option<ParkingArea>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let points = value
        .split(';')
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("PARKWATCH_PARKING_AREA: expected x,y in '{}'", pair))?;
            let x = x.trim().parse::<i32>();
            let y = y.trim().parse::<i32>();
            match (x, y) {
                (Ok(x), Ok(y)) => Ok(Point::new(x, y)),
                _ => Err(anyhow!("PARKWATCH_PARKING_AREA: bad coordinate '{}'", pair)),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    ParkingArea::from_points(&points)
        .map(Some)
        .map_err(|e| anyhow!("PARKWATCH_PARKING_AREA: {}", e))
}
