//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file into RGB frames, one packet
//! at a time, and flushes the decoder once the container runs dry.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use crate::frame::{Frame, VideoInfo};

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: VideoInfo,
    frame_count: u64,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", path))?;
        let stream_index = input_stream.index();
        let fps = f64::from(input_stream.avg_frame_rate());
        let frame_count = input_stream.frames().max(0) as u64;
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = VideoInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps: if fps.is_finite() { fps } else { 0.0 },
            frame_count,
        };
        log::info!(
            "VideoSource: opened {} (ffmpeg, {}x{} @ {:.2} fps, {} frames)",
            path,
            info.width,
            info.height,
            info.fps,
            info.frame_count
        );

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            info,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn info(&self) -> VideoInfo {
        self.info
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let image = self.convert(&decoded)?;
                self.frame_count += 1;
                return Ok(Some(Frame::new(self.frame_count, image)));
            }
            if self.eof_sent {
                log::debug!("{}: decoded {} frames", self.path, self.frame_count);
                return Ok(None);
            }

            let packet = self
                .input
                .packets()
                .find(|(stream, _)| stream.index() == self.stream_index)
                .map(|(_, packet)| packet);
            match packet {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("decoded frame buffer does not match {}x{}", width, height))
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame buffer is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
