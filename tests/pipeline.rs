use std::sync::Arc;
use std::time::Instant;

use parkwatch::alert::{ManualClock, SimulatedGpio};
use parkwatch::detect::{ColorClass, Detection, ScriptedBackend};
use parkwatch::ingest::{self, CaptureConfig, SyntheticSource};
use parkwatch::status::{Liveness, StatusReport};
use parkwatch::{Frame, Monitor, ParkwatchConfig, Rect, Warning};

fn hsv_monitor(cfg: &ParkwatchConfig) -> Monitor {
    let clock = ManualClock::new();
    let gpio = SimulatedGpio::silent(clock.clone());
    Monitor::from_config(cfg, Box::new(gpio), Arc::new(clock))
}

fn lot_frame(index: u64) -> Frame {
    Frame::new(SyntheticSource::render(1280, 720, index), index)
}

#[test]
fn synthetic_lot_fills_spots_one_and_seven() {
    let cfg = ParkwatchConfig::default();
    let mut source = ingest::open(&cfg.capture).expect("open source");
    source.connect().expect("connect");
    let mut monitor = hsv_monitor(&cfg);

    let frame = source.next_frame().expect("frame");
    assert_eq!(frame.index, 0);
    let report = monitor.process_frame(&frame);

    assert_eq!(report.vehicles.len(), 3);
    let occupied: Vec<(u32, Option<ColorClass>)> = report
        .spots
        .iter()
        .filter(|s| s.occupied)
        .map(|s| (s.id, s.vehicle_color))
        .collect();
    assert_eq!(
        occupied,
        vec![(1, Some(ColorClass::Blue)), (7, Some(ColorClass::White))]
    );
    assert!(report.warnings.is_empty());
    assert!(!report.alert.triggered);
}

#[test]
fn driving_car_keeps_its_id_and_warns_near_sensor_one() {
    let cfg = ParkwatchConfig::default();
    let mut monitor = hsv_monitor(&cfg);

    let mut yellow_id = None;
    let mut first_warning_frame = None;
    for index in 96..110 {
        let report = monitor.process_frame(&lot_frame(index));
        let yellow = report
            .vehicles
            .iter()
            .find(|v| v.color() == ColorClass::Yellow)
            .expect("yellow car tracked");
        match yellow_id {
            None => yellow_id = Some(yellow.id),
            Some(id) => assert_eq!(yellow.id, id, "frame {index}"),
        }

        let near_sensor_one = report.warnings.iter().any(|w| {
            matches!(
                w,
                Warning::SensorProximity { sensor_id: 1, vehicle_color: ColorClass::Yellow, .. }
            )
        });
        if near_sensor_one && first_warning_frame.is_none() {
            first_warning_frame = Some(index);
            assert!(report.alert.triggered);
            assert!(report.alert.actuators_on);
        }
    }

    assert_eq!(first_warning_frame, Some(101));
    let snapshot = monitor.handle().latest().expect("snapshot");
    let yellow = snapshot
        .report
        .vehicles
        .iter()
        .find(|v| v.color() == ColorClass::Yellow)
        .expect("yellow car");
    assert_eq!(yellow.history.len(), 10);
}

#[test]
fn snapshot_is_readable_from_another_thread() {
    let cfg = ParkwatchConfig::default();
    let mut monitor = hsv_monitor(&cfg);
    let handle = monitor.handle();
    assert!(handle.latest().is_none());

    monitor.process_frame(&lot_frame(0));
    monitor.process_frame(&lot_frame(1));

    let reader_cfg = cfg.clone();
    let status = std::thread::spawn(move || {
        StatusReport::build(handle.latest().as_ref(), &reader_cfg, Instant::now())
    })
    .join()
    .expect("reader thread");

    assert_eq!(status.status, Liveness::Active);
    assert_eq!(status.frame_count, 2);
    assert_eq!(status.total_vehicles, 3);
    assert_eq!(status.occupied_spots, 2);
    assert_eq!(status.vehicles_by_color[&ColorClass::Blue], 1);
    assert_eq!(status.parking_status.len(), 8);
}

#[test]
fn still_image_source_feeds_the_pipeline() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("lot.png");
    SyntheticSource::render(1280, 720, 0)
        .save(&path)
        .expect("write png");

    let mut cfg = ParkwatchConfig::default();
    cfg.capture = CaptureConfig {
        source: path.display().to_string(),
        ..CaptureConfig::default()
    };
    cfg.validate().expect("valid config");

    let mut source = ingest::open(&cfg.capture).expect("open source");
    source.connect().expect("connect");
    let mut monitor = hsv_monitor(&cfg);

    let first = monitor.process_frame(&source.next_frame().expect("frame"));
    let second = monitor.process_frame(&source.next_frame().expect("frame"));
    assert_eq!(first.occupied_spots(), 2);
    assert_eq!(second.frame_index, 1);
    let ids = |r: &parkwatch::FrameReport| r.vehicles.iter().map(|v| v.id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn missing_image_fails_to_connect() {
    let dir = tempfile::tempdir().expect("temp dir");
    let capture = CaptureConfig {
        source: dir.path().join("absent.png").display().to_string(),
        ..CaptureConfig::default()
    };
    let mut source = ingest::open(&capture).expect("open source");
    assert!(source.connect().is_err());
}

#[test]
fn close_vehicles_raise_a_collision_alert() {
    let cfg = ParkwatchConfig::default();
    let backend = ScriptedBackend::new(vec![
        vec![
            Detection::from_box(ColorClass::Blue, Rect::new(450, 260, 100, 80)),
            Detection::from_box(ColorClass::White, Rect::new(540, 260, 100, 80)),
        ],
        Vec::new(),
    ]);
    let clock = ManualClock::new();
    let gpio = SimulatedGpio::silent(clock.clone());
    let pins = gpio.state();
    let mut monitor = Monitor::new(&cfg, Box::new(backend), Box::new(gpio), Arc::new(clock));

    let report = monitor.process_frame(&lot_frame(0));
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.collision_count(), 1);
    assert_eq!(report.warnings[0].distance(), 90.0);
    assert!(report.alert.triggered);
    assert!(pins.lock().unwrap().buzzer);

    let report = monitor.process_frame(&lot_frame(1));
    assert!(report.warnings.is_empty());
    assert!(!report.alert.actuators_on);
    assert!(!pins.lock().unwrap().buzzer);
}
