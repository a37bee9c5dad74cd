//! Frame annotation: thresholding raw detections and drawing overlays.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{DetectionTensor, PixelBox};
use crate::zone::OccupancyTally;

pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Left margin of occupancy text.
pub const TEXT_X: i32 = 15;
/// Baseline of the first occupancy line.
pub const TEXT_FIRST_Y: i32 = 25;
/// Distance between occupancy baselines.
pub const TEXT_LINE_STEP: i32 = 40;

const DEFAULT_TEXT_SCALE: f32 = 24.0;
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");
const QUEUE_FULL: &str = "Queue full; Please move to next Queue";

/// One line of occupancy text and its anchor (left edge, baseline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayLine {
    pub zone: usize,
    pub text: String,
    pub queue_full: bool,
    pub x: i32,
    pub y: i32,
}

/// Turns model output into pixel boxes and draws them with occupancy text.
pub struct FrameAnnotator {
    font: Option<FontArc>,
    text_scale: PxScale,
}

impl FrameAnnotator {
    /// Annotator using the bundled DejaVu Sans Mono for occupancy text.
    pub fn new() -> Self {
        let font = FontArc::try_from_slice(BUNDLED_FONT).ok();
        if font.is_none() {
            log::warn!("bundled font failed to parse; occupancy text is logged, not drawn");
        }
        Self {
            font,
            text_scale: PxScale::from(DEFAULT_TEXT_SCALE),
        }
    }

    /// Annotator that draws boxes only; text lines are still computed.
    pub fn without_text() -> Self {
        Self {
            font: None,
            ..Self::new()
        }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            ..Self::without_text()
        }
    }

    /// Load a TTF/OTF font for occupancy text.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("invalid font file {}", path.display()))?;
        Ok(Self::with_font(font))
    }

    pub fn with_text_scale(mut self, scale: f32) -> Self {
        self.text_scale = PxScale::from(scale);
        self
    }

    pub fn renders_text(&self) -> bool {
        self.font.is_some()
    }

    /// Keep detections with `confidence >= threshold` and scale them to pixels.
    ///
    /// Model order is preserved; overlapping boxes are not merged.
    pub fn to_pixel_boxes(
        raw: &DetectionTensor,
        threshold: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<PixelBox> {
        raw.detections()
            .filter(|det| det.confidence >= threshold)
            .map(|det| det.to_pixels(frame_width, frame_height))
            .collect()
    }

    /// Draw a 1-pixel outline for each box, corners inclusive.
    ///
    /// Edges beyond the image are not drawn; boxes wholly outside it are
    /// skipped.
    pub fn draw(&self, image: &mut RgbImage, boxes: &[PixelBox]) {
        let (width, height) = image.dimensions();
        for b in boxes {
            let Some((x0, x1)) = clip_span(b.x_min, b.x_max, width) else {
                continue;
            };
            let Some((y0, y1)) = clip_span(b.y_min, b.y_max, height) else {
                continue;
            };
            let rect = Rect::at(x0, y0).of_size(x1.abs_diff(x0) + 1, y1.abs_diff(y0) + 1);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }
    }

    /// Render one occupancy line per zone and return the lines drawn.
    ///
    /// An annotator built with `without_text` leaves the image untouched.
    pub fn overlay_text(
        &self,
        image: &mut RgbImage,
        tally: &OccupancyTally,
        max_people: u32,
    ) -> Vec<OverlayLine> {
        let lines = occupancy_lines(tally, max_people);
        if let Some(font) = &self.font {
            let ascent = self.text_scale.y.round() as i32;
            for line in &lines {
                let top = (line.y - ascent).max(0);
                draw_text_mut(
                    image,
                    TEXT_COLOR,
                    line.x,
                    top,
                    self.text_scale,
                    font,
                    &line.text,
                );
            }
        }
        lines
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

/// Order one box axis and pull off-image ends to one pixel outside the image,
/// so their edge stays invisible. `None` when the span misses the image.
fn clip_span(a: i32, b: i32, len: u32) -> Option<(i32, i32)> {
    let len = i32::try_from(len).ok()?;
    let (lo, hi) = (a.min(b), a.max(b));
    if len == 0 || hi < 0 || lo >= len {
        return None;
    }
    Some((lo.max(-1), hi.min(len)))
}

/// Occupancy text for each zone in ascending index order.
pub fn occupancy_lines(tally: &OccupancyTally, max_people: u32) -> Vec<OverlayLine> {
    tally
        .iter()
        .enumerate()
        .map(|(row, (&zone, &count))| {
            let queue_full = count >= max_people;
            let mut text = format!("No. of People in Queue {} is {}", zone, count);
            if queue_full {
                text.push_str("  ");
                text.push_str(QUEUE_FULL);
            }
            OverlayLine {
                zone,
                text,
                queue_full,
                x: TEXT_X,
                y: TEXT_FIRST_Y + TEXT_LINE_STEP * row as i32,
            }
        })
        .collect()
}
