//! parkwatch_status - run the pipeline on one frame and print the status document
//!
//! Useful for tuning color ranges and spot boxes against a still image
//! without GPIO hardware: actuators are logged, the ultrasonic sensor is silent.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parkwatch::alert::{LoggingGpio, MonotonicClock};
use parkwatch::{ingest, Monitor, ParkwatchConfig, StatusReport};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PARKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Image to analyse; defaults to the configured source.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Number of frames to run before reporting (lets tracking settle).
    #[arg(long, default_value_t = 1)]
    frames: u64,
    /// Print the full frame report instead of the status document.
    #[arg(long)]
    report: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = ParkwatchConfig::load_from(args.config.as_deref())?;
    if let Some(image) = &args.image {
        cfg.capture.source = image.display().to_string();
        cfg.validate()?;
    }

    let mut source = ingest::open(&cfg.capture)?;
    source
        .connect()
        .with_context(|| format!("failed to open frame source {}", cfg.capture.source))?;

    let gpio = LoggingGpio::new(cfg.gpio);
    let mut monitor = Monitor::from_config(&cfg, Box::new(gpio), Arc::new(MonotonicClock::new()));

    let mut last = None;
    for _ in 0..args.frames.max(1) {
        let frame = source.next_frame()?;
        last = Some(monitor.process_frame(&frame));
    }
    monitor.shutdown();

    if args.report {
        if let Some(report) = &last {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        return Ok(());
    }

    let status = StatusReport::build(monitor.handle().latest().as_ref(), &cfg, Instant::now());
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
