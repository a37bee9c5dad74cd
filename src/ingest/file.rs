//! Local video file source.
//!
//! `VideoSource` reads frames sequentially from a local file until the stream
//! is exhausted. Paths starting with `stub://` produce synthetic frames for
//! tests and dry runs; every other path needs the `video-ffmpeg` feature.
//! Remote URL schemes are rejected.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::error::{ErrorKind, MonitorError};
use crate::frame::{Frame, VideoInfo};

const STUB_PREFIX: &str = "stub://";
const STUB_DEFAULT_FRAMES: u64 = 30;
const STUB_DEFAULT_WIDTH: u32 = 640;
const STUB_DEFAULT_HEIGHT: u32 = 480;
const STUB_DEFAULT_FPS: f64 = 10.0;

/// Sequential frame source for one video file.
pub struct VideoSource {
    backend: SourceBackend,
}

enum SourceBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl VideoSource {
    /// Open a video. Failures carry `ErrorKind::VideoOpen`.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_backend(path).map_err(|e| MonitorError::wrap(ErrorKind::VideoOpen, e))
    }

    fn open_backend(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "video input only supports local paths (no URL schemes): '{}'",
                path
            ));
        }
        if let Some(location) = path.strip_prefix(STUB_PREFIX) {
            let source = SyntheticSource::parse(location)?;
            log::info!(
                "VideoSource: opened {} (synthetic, {} frames)",
                path,
                source.total
            );
            return Ok(Self {
                backend: SourceBackend::Synthetic(source),
            });
        }

        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Self {
                backend: SourceBackend::Ffmpeg(FfmpegFileSource::new(path)?),
            })
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!(
                "reading '{}' requires the video-ffmpeg feature",
                path
            ))
        }
    }

    pub fn info(&self) -> VideoInfo {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.info(),
            #[cfg(feature = "video-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.info(),
        }
    }

    /// Decode the next frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "video-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.produced,
            #[cfg(feature = "video-ffmpeg")]
            SourceBackend::Ffmpeg(source) => source.frames_read(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

/// `stub://name?frames=N&width=W&height=H&fps=F`
struct SyntheticSource {
    total: u64,
    produced: u64,
    width: u32,
    height: u32,
    fps: f64,
}

impl SyntheticSource {
    fn parse(location: &str) -> Result<Self> {
        let mut source = Self {
            total: STUB_DEFAULT_FRAMES,
            produced: 0,
            width: STUB_DEFAULT_WIDTH,
            height: STUB_DEFAULT_HEIGHT,
            fps: STUB_DEFAULT_FPS,
        };
        let Some((_, query)) = location.split_once('?') else {
            return Ok(source);
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            let bad = || anyhow!("invalid value '{}' for stub parameter '{}'", value, key);
            match key {
                "frames" => source.total = value.parse().map_err(|_| bad())?,
                "width" => source.width = value.parse().map_err(|_| bad())?,
                "height" => source.height = value.parse().map_err(|_| bad())?,
                "fps" => source.fps = value.parse().map_err(|_| bad())?,
                _ => return Err(anyhow!("unknown stub parameter '{}'", key)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        Ok(source)
    }

    fn info(&self) -> VideoInfo {
        VideoInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: self.total,
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.produced >= self.total {
            return None;
        }
        self.produced += 1;
        let shift = self.produced;
        let image = RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x as u64 + shift) % 256) as u8,
                ((y as u64 + shift) % 256) as u8,
                (shift % 256) as u8,
            ])
        });
        Some(Frame::new(self.produced, image))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_PREFIX) {
        return true;
    }
    !path.contains("://")
}
