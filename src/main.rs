use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use uwb_tracker_rs::config::TrackerConfig;
use uwb_tracker_rs::error::RangingError;
use uwb_tracker_rs::geometry::Algorithm;
use uwb_tracker_rs::gps;
use uwb_tracker_rs::tracker::PositionTracker;
use uwb_tracker_rs::transport::mock::{MockLink, SyntheticStream};
use uwb_tracker_rs::types::{current_timestamp, InertialSample, Point};

#[derive(Parser, Debug)]
#[command(name = "uwb_tracker")]
#[command(about = "UWB two-anchor position tracker - GPS/AHRS assisted trilateration", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Trilateration method (cosine, circle)
    #[arg(long, default_value = "cosine")]
    algorithm: String,

    /// Output directory
    #[arg(long, default_value = "uwb_tracker_sessions")]
    output_dir: String,
}

#[derive(Serialize)]
struct LiveStatus {
    timestamp: f64,
    uptime_seconds: u64,
    gps_fixes: u64,
    inertial_samples: u64,
    frames_produced: u64,
    valid_frames: u64,
    last_position: Option<Point>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] UWB Tracker Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Algorithm: {}", args.algorithm);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let algorithm = match args.algorithm.as_str() {
        "circle" => Algorithm::CircleIntersection,
        _ => Algorithm::LawOfCosines,
    };

    let config = TrackerConfig::default();

    // No hardware attached in the demo: a mock link plus a synthetic
    // measurement stream tied to the first two configured anchors.
    let stream = SyntheticStream::new(
        &config.anchors[0].address,
        &config.anchors[1].address,
        std::time::Duration::from_millis(200),
    );
    let mut tracker = PositionTracker::new(
        MockLink::healthy(),
        Some(Box::new(stream)),
        config,
        algorithm,
    )
    .map_err(|err| anyhow::anyhow!("tracker construction failed: {err}"))?;
    tracker
        .launch()
        .map_err(|err| anyhow::anyhow!("tracker launch failed: {err}"))?;

    let (gps_tx, mut gps_rx) = mpsc::channel::<String>(100);
    let (imu_tx, mut imu_rx) = mpsc::channel::<InertialSample>(500);

    let _gps_handle = tokio::spawn(gps_loop(gps_tx));
    let _imu_handle = tokio::spawn(inertial_loop(imu_tx));

    let mut gps_count = 0u64;
    let mut imu_count = 0u64;
    let mut last_position: Option<Point> = None;

    let start = Utc::now();
    let mut last_status_update = Utc::now();

    println!("[{}] Starting tracking loop...", ts_now());

    loop {
        if args.duration > 0 {
            let elapsed = Utc::now().signed_duration_since(start);
            if elapsed.num_seconds() as u64 >= args.duration {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
        }

        tokio::select! {
            _ = sleep(Duration::from_millis(200)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }

        while let Ok(sentence) = gps_rx.try_recv() {
            if let Some(fix) = gps::parse_gga(&sentence) {
                tracker.feed_gps(fix);
                gps_count += 1;
            }
        }

        while let Ok(sample) = imu_rx.try_recv() {
            tracker.feed_inertial(sample);
            imu_count += 1;
        }

        match tracker.next_frame() {
            Ok(frame) => {
                if !frame.computed_position.is_sentinel() {
                    last_position = Some(frame.computed_position.clone());
                }
            }
            // Nothing to fuse yet; the next cycle retries.
            Err(RangingError::NoData) => {}
            Err(err) => log::warn!("tracking cycle failed: {err}"),
        }

        let now = Utc::now();
        if now.signed_duration_since(last_status_update).num_seconds() >= 2 {
            let stats = tracker.stats();
            let uptime = now.signed_duration_since(start).num_seconds().max(0) as u64;

            let status = LiveStatus {
                timestamp: current_timestamp(),
                uptime_seconds: uptime,
                gps_fixes: gps_count,
                inertial_samples: imu_count,
                frames_produced: stats.frames_produced,
                valid_frames: stats.valid_frames,
                last_position: last_position.clone(),
            };
            let status_path = format!("{}/live_status.json", args.output_dir);
            if let Ok(json) = serde_json::to_string_pretty(&status) {
                let _ = std::fs::write(&status_path, json);
            }

            if let Some(position) = &last_position {
                println!(
                    "[{}] frames: {} ({} valid) | {}",
                    ts_now(),
                    stats.frames_produced,
                    stats.valid_frames,
                    position
                );
            } else {
                println!(
                    "[{}] frames: {} ({} valid) | no position yet",
                    ts_now(),
                    stats.frames_produced,
                    stats.valid_frames
                );
            }
            last_status_update = now;
        }
    }

    let log_path = format!("{}/session_{}.txt", args.output_dir, ts_now_clean());
    tracker.shutdown(std::path::Path::new(&log_path))?;

    let stats = tracker.stats();
    println!("\n=== Final Stats ===");
    println!("Frames produced: {}", stats.frames_produced);
    println!("Valid frames: {}", stats.valid_frames);
    println!("GPS fixes: {gps_count}");
    println!("Inertial samples: {imu_count}");
    if let Some(position) = &last_position {
        println!("Last position: {position}");
    }
    println!("Session log: {log_path}");

    Ok(())
}

/// Synthetic GGA feed wandering around the demo anchor ring, 1 Hz.
async fn gps_loop(tx: mpsc::Sender<String>) {
    let mut tick = 0u64;
    loop {
        tick += 1;
        let t = tick as f64 * 0.1;
        // ddmm.mmmm around 50.28778 N, 18.67760 E.
        let lat_ddmm = 5017.2668 + 0.0050 * t.sin();
        let lon_ddmm = 1840.6560 + 0.0050 * t.cos();
        let sentence = format!(
            "$GPGGA,{},{:09.4},N,{:010.4},E,1,08,0.9,248.0,M,46.9,M,,*47",
            Utc::now().format("%H%M%S"),
            lat_ddmm,
            lon_ddmm,
        );
        if tx.send(sentence).await.is_err() {
            break;
        }
        sleep(Duration::from_millis(1000)).await;
    }
}

/// Synthetic AHRS feed, 10 Hz.
async fn inertial_loop(tx: mpsc::Sender<InertialSample>) {
    let mut tick = 0u64;
    loop {
        tick += 1;
        let t = tick as f64 * 0.1;
        let sample = InertialSample::new(
            nalgebra::Vector3::new(0.15 * t.sin(), 0.15 * t.cos(), 9.81),
            nalgebra::Vector3::new(0.01 * t.cos(), 0.01 * t.sin(), 0.002),
            nalgebra::Vector3::new(21.0 + t.sin(), 3.0, -42.0 + t.cos()),
        );
        if tx.send(sample).await.is_err() {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
