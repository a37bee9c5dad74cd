//! Queue Monitor
//!
//! Counts people standing in user-defined rectangular zones ("queues") of a
//! video, draws the detections and per-queue occupancy onto every frame, and
//! writes the annotated video plus a throughput report.
//!
//! # Module Structure
//!
//! - `detect`: detector backends (scripted stub, tract ONNX) and raw detection records
//! - `annotate`: confidence thresholding, pixel scaling, box and text overlays
//! - `zone`: queue zones, per-frame occupancy tally, zone crops
//! - `ingest` / `sink`: sequential video input and annotated video output
//! - `pipeline`: the frame loop tying the above together
//! - `stats`: load/inference timing and the `stats.txt` report
//! - `config`: layered configuration (JSON file, environment, command line)
//! - `error`: failure kinds for setup and per-frame errors
//!
//! Model inference and video codecs are feature-gated (`backend-tract`,
//! `video-ffmpeg`); without them only `stub://` models and videos are usable.

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod stats;
pub mod zone;

pub use annotate::{occupancy_lines, FrameAnnotator, OverlayLine};
pub use config::{ConfigOverrides, MonitorConfig};
pub use detect::{load_detector, Detection, DetectionTensor, DetectorBackend, PixelBox, StubBackend};
pub use error::{kind_of, ErrorKind, MonitorError};
pub use frame::{Frame, VideoInfo};
pub use ingest::VideoSource;
pub use pipeline::{FrameReport, QueueMonitor, RunSummary};
pub use sink::{VideoSink, OUTPUT_VIDEO_NAME};
pub use stats::{RunStats, STATS_FILE_NAME};
pub use zone::{load_zone_params, ContainmentMode, OccupancyTally, Zone, ZoneTracker};
