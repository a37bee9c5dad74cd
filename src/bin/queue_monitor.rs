//! queue_monitor - count people per queue zone in a video
//!
//! This binary:
//! 1. Loads the person detector (timed as model load)
//! 2. Loads queue zones from the zone-parameter file (optional, degrades to none)
//! 3. Reads the input video frame by frame, annotating boxes and queue occupancy
//! 4. Writes `output_video.mp4` and `stats.txt` into the output directory

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use queue_monitor::{
    load_detector, load_zone_params, ConfigOverrides, FrameAnnotator, MonitorConfig,
    QueueMonitor, RunStats, VideoSink, VideoSource, ZoneTracker, OUTPUT_VIDEO_NAME,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "QUEUE_MONITOR_CONFIG")]
    config: Option<PathBuf>,
    /// Detection model path (`stub://` for the scripted detector).
    #[arg(long)]
    model: Option<String>,
    /// Execution device (default CPU).
    #[arg(long)]
    device: Option<String>,
    /// Input video path (`stub://` for a synthetic stream).
    #[arg(long)]
    video: Option<String>,
    /// Zone-parameter file (JSON, or TOML with a `.toml` extension).
    #[arg(long = "queue-param", alias = "queue_param")]
    queue_param: Option<PathBuf>,
    /// Directory for output_video.mp4 and stats.txt (default /results).
    #[arg(long = "output-path", alias = "output_path")]
    output_path: Option<PathBuf>,
    /// Occupancy at which a queue is reported full (default 2).
    #[arg(long = "max-people", alias = "max_people")]
    max_people: Option<u32>,
    /// Minimum detection confidence, inclusive (default 0.60).
    #[arg(long)]
    threshold: Option<f32>,
    /// TTF/OTF font for occupancy text (default: bundled DejaVu Sans Mono).
    #[arg(long)]
    font: Option<PathBuf>,
    /// Zone test: `horizontal` (default) or `full`.
    #[arg(long)]
    containment: Option<String>,
    /// Model input width in pixels (default 544).
    #[arg(long = "input-width")]
    input_width: Option<u32>,
    /// Model input height in pixels (default 320).
    #[arg(long = "input-height")]
    input_height: Option<u32>,
    /// Console output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            device: self.device.clone(),
            video: self.video.clone(),
            queue_param: self.queue_param.clone(),
            output_path: self.output_path.clone(),
            max_people: self.max_people,
            threshold: self.threshold,
            font: self.font.clone(),
            containment: self.containment.clone(),
            input_width: self.input_width,
            input_height: self.input_height,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = MonitorConfig::load(args.config.as_deref(), args.overrides())?;
    let ui = ui::Ui::new(ui::UiMode::parse(&args.ui), std::io::stderr().is_terminal());

    log::info!(
        "model={} device={} threshold={:.2} max_people={}",
        cfg.model,
        cfg.device,
        cfg.threshold,
        cfg.max_people
    );

    let load_started = Instant::now();
    let detector = {
        let _stage = ui.stage("load model");
        load_detector(&cfg.model, &cfg.device, cfg.input_width, cfg.input_height)?
    };
    let model_load = load_started.elapsed();

    let tracker = load_tracker(&cfg);
    let annotator = match &cfg.font {
        Some(path) => FrameAnnotator::with_font_file(path)?,
        None => FrameAnnotator::new(),
    };

    let mut source = VideoSource::open(&cfg.video)?;
    let info = source.info();

    std::fs::create_dir_all(&cfg.output_path).with_context(|| {
        format!(
            "failed to create output directory {}",
            cfg.output_path.display()
        )
    })?;
    let mut sink = VideoSink::create(&cfg.output_path.join(OUTPUT_VIDEO_NAME), &info)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let mut monitor = QueueMonitor::new(
        detector,
        tracker,
        annotator,
        cfg.threshold,
        cfg.max_people,
    );

    let summary = {
        let _stage = ui.stage("process video");
        let progress = ui.frames(info.frame_count);
        let summary = monitor.run_with(&mut source, &mut sink, &stop, |index, report| {
            progress.inc(1);
            log::debug!(
                "frame {}: {} people, queues {:?}",
                index,
                report.people_in_frame(),
                report.tally
            );
            for line in &report.lines {
                log::trace!("frame {}: {}", index, line.text);
            }
        });
        progress.finish_and_clear();
        summary
    };

    let stats = RunStats {
        model_load,
        inference: summary.elapsed,
        frames: summary.frames,
    };
    let report_path = stats.write_report(&cfg.output_path)?;
    log::info!(
        "{} frames in {:.1}s ({:.2} fps), model load {:.3}s; stats written to {}",
        stats.frames,
        stats.total_inference_secs(),
        stats.fps(),
        stats.model_load.as_secs_f64(),
        report_path.display()
    );
    log::info!(
        "annotated video: {} ({} frames)",
        cfg.output_path.join(OUTPUT_VIDEO_NAME).display(),
        summary.frames_written
    );

    match summary.aborted {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Zones from the parameter file. A missing or malformed file leaves the
/// tracker empty and the run continues.
fn load_tracker(cfg: &MonitorConfig) -> ZoneTracker {
    let mut tracker = ZoneTracker::new().with_mode(cfg.containment);
    let Some(path) = &cfg.queue_param else {
        log::info!("no zone-parameter file configured; counting no queues");
        return tracker;
    };
    match load_zone_params(path) {
        Ok(zones) => {
            for zone in zones {
                tracker.add_zone(zone);
            }
            log::info!("loaded {} queue zones from {}", tracker.len(), path.display());
        }
        Err(e) => log::warn!("error loading queue param file: {:#}", e),
    }
    tracker
}
