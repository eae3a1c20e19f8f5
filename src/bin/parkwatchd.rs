//! parkwatchd - parking lot monitor daemon
//!
//! This daemon:
//! 1. Loads configuration (defaults, optional file, environment overrides)
//! 2. Opens the configured frame source; failure to connect is fatal
//! 3. Runs the per-frame pipeline at the configured frame rate
//! 4. Logs a status summary every `status_log_interval` frames
//! 5. Turns the LED and buzzer off on Ctrl-C

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parkwatch::alert::{LoggingGpio, MonotonicClock};
use parkwatch::{ingest, Monitor, ParkwatchConfig, StatusReport};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PARKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source override: stub://<name> or a local image path.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ParkwatchConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.capture.source = source;
        cfg.validate()?;
    }

    let mut source = ingest::open(&cfg.capture)?;
    source
        .connect()
        .with_context(|| format!("failed to open frame source {}", cfg.capture.source))?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("error setting Ctrl-C handler")?;

    let gpio = LoggingGpio::new(cfg.gpio);
    let mut monitor = Monitor::from_config(&cfg, Box::new(gpio), Arc::new(MonotonicClock::new()));
    monitor.warm_up();
    let handle = monitor.handle();

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(cfg.capture.fps));

    log::info!(
        "parkwatchd running. source={}, {}x{} @ {} fps",
        cfg.capture.source,
        cfg.capture.width,
        cfg.capture.height,
        cfg.capture.fps
    );
    log::info!(
        "{} spot(s), {} sensor(s), {} barrier(s), parking area {}",
        cfg.parking_spots.len(),
        cfg.sensors.len(),
        cfg.barriers.len(),
        if cfg.parking_area.is_some() { "set" } else { "not set" }
    );

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        match source.next_frame() {
            Ok(frame) => {
                monitor.process_frame(&frame);
                if monitor.frames_processed() % cfg.status_log_interval == 0 {
                    let status = StatusReport::build(handle.latest().as_ref(), &cfg, Instant::now());
                    log::info!("{}", status.summary_line());
                }
            }
            Err(e) => {
                log::warn!("frame capture failed: {:#}", e);
                monitor.skip_cycle();
                if !source.is_healthy() {
                    log::warn!("frame source {} reports unhealthy", cfg.capture.source);
                }
            }
        }

        if let Some(max) = args.max_frames {
            if monitor.frames_processed() >= max {
                log::info!("reached --max-frames {}", max);
                break;
            }
        }

        if let Some(rest) = frame_interval.checked_sub(cycle_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log::info!("parkwatchd stopping, turning actuators off");
    monitor.shutdown();
    let stats = source.stats();
    log::info!(
        "captured {} frame(s) from {}",
        stats.frames_captured,
        stats.source
    );
    Ok(())
}
