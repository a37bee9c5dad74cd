//! Decoded video frames and stream properties.

use image::RgbImage;

/// Properties of an opened video stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second as reported by the container.
    pub fps: f64,
    /// Frame count as reported by the container (0 when unknown).
    pub frame_count: u64,
}

impl VideoInfo {
    /// Integral frame rate for the writer (truncated), at least 1.
    pub fn writer_fps(&self) -> i32 {
        (self.fps as i32).max(1)
    }
}

/// One decoded RGB frame.
pub struct Frame {
    /// 1-based position in the stream.
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
