//! Video frame sources.
//!
//! - Local video files (feature: video-ffmpeg)
//! - Synthetic `stub://` streams (tests, dry runs)
//!
//! Sources read sequentially and never seek. Decoded frames are handed to the
//! pipeline one at a time and are not retained.

pub mod file;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::VideoSource;
