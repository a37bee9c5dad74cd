//! Output video writer.
//!
//! `VideoSink` accepts annotated frames in order. The file backend encodes
//! them at the input's size and frame rate; the memory backend keeps them for
//! inspection. `finish` must be called to flush the encoder; it is idempotent.

use std::path::Path;

use anyhow::{anyhow, Result};
use image::RgbImage;

#[cfg(feature = "video-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSink;
use crate::error::{ErrorKind, MonitorError};
use crate::frame::VideoInfo;

/// File name of the annotated video inside the output directory.
pub const OUTPUT_VIDEO_NAME: &str = "output_video.mp4";

pub struct VideoSink {
    backend: SinkBackend,
    written: u64,
    finished: bool,
}

enum SinkBackend {
    Memory(Vec<RgbImage>),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(Box<FfmpegFileSink>),
}

impl VideoSink {
    /// Create an encoder writing to `path`. Failures carry `ErrorKind::VideoWrite`.
    pub fn create(path: &Path, info: &VideoInfo) -> Result<Self> {
        Self::create_backend(path, info)
            .map(Self::with_backend)
            .map_err(|e| MonitorError::wrap(ErrorKind::VideoWrite, e))
    }

    /// Sink that keeps every written frame in memory.
    pub fn memory() -> Self {
        Self::with_backend(SinkBackend::Memory(Vec::new()))
    }

    fn with_backend(backend: SinkBackend) -> Self {
        Self {
            backend,
            written: 0,
            finished: false,
        }
    }

    #[cfg(feature = "video-ffmpeg")]
    fn create_backend(path: &Path, info: &VideoInfo) -> Result<SinkBackend> {
        Ok(SinkBackend::Ffmpeg(Box::new(FfmpegFileSink::new(path, info)?)))
    }

    #[cfg(not(feature = "video-ffmpeg"))]
    fn create_backend(path: &Path, _info: &VideoInfo) -> Result<SinkBackend> {
        Err(anyhow!(
            "writing '{}' requires the video-ffmpeg feature",
            path.display()
        ))
    }

    pub fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(anyhow!("video sink already finished"));
        }
        match &mut self.backend {
            SinkBackend::Memory(frames) => frames.push(frame.clone()),
            #[cfg(feature = "video-ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.write(frame)?,
        }
        self.written += 1;
        Ok(())
    }

    /// Flush pending output. Later calls are no-ops.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        match &mut self.backend {
            SinkBackend::Memory(_) => Ok(()),
            #[cfg(feature = "video-ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.finish(),
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Frames kept by a memory sink; empty for file sinks.
    pub fn frames(&self) -> &[RgbImage] {
        match &self.backend {
            SinkBackend::Memory(frames) => frames.as_slice(),
            #[cfg(feature = "video-ffmpeg")]
            SinkBackend::Ffmpeg(_) => &[],
        }
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("failed to finalize output video: {:#}", e);
        }
    }
}
