//! Annotated video output.
//!
//! - Local MP4 files (feature: video-ffmpeg)
//! - In-memory frame capture (tests)

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{VideoSink, OUTPUT_VIDEO_NAME};
