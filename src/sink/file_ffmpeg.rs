//! MP4 output using FFmpeg.
//!
//! Frames are converted RGB24 -> YUV420P and encoded with H.264, or MPEG-4 Part 2
//! when no H.264 encoder is available in the linked FFmpeg.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;
use image::RgbImage;

use crate::frame::VideoInfo;

pub(crate) struct FfmpegFileSink {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl FfmpegFileSink {
    pub(crate) fn new(path: &Path, info: &VideoInfo) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to create '{}' with ffmpeg", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .or_else(|| ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4))
            .ok_or_else(|| anyhow!("no H.264 or MPEG-4 encoder available"))?;

        let fps = info.writer_fps();
        let encoder_time_base = ffmpeg::Rational::new(1, fps);

        let mut stream = output.add_stream(codec).context("add output video stream")?;
        let stream_index = stream.index();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        encoder.set_width(info.width);
        encoder.set_height(info.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder
            .open_as(codec)
            .with_context(|| format!("open {} encoder", codec.name()))?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .context("write output container header")?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("output stream vanished after header"))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            Pixel::RGB24,
            info.width,
            info.height,
            Pixel::YUV420P,
            info.width,
            info.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "VideoSink: writing {} ({}, {}x{} @ {} fps)",
            path.display(),
            codec.name(),
            info.width,
            info.height,
            fps
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width: info.width,
            height: info.height,
            next_pts: 0,
        })
    }

    pub(crate) fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "frame size {}x{} does not match output {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, self.width, self.height);
        copy_into_frame(frame, &mut rgb)?;

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("convert frame to YUV420P")?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to ffmpeg encoder")?;
        self.drain_packets()
    }

    pub(crate) fn finish(&mut self) -> Result<()> {
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .context("write output container trailer")
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

fn copy_into_frame(image: &RgbImage, frame: &mut ffmpeg::frame::Video) -> Result<()> {
    let row_bytes = image.width() as usize * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data_mut(0);
    for (row, src) in image.as_raw().chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        data.get_mut(start..start + row_bytes)
            .context("ffmpeg frame row is out of bounds")?
            .copy_from_slice(src);
    }
    Ok(())
}
