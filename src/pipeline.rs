//! Frame-by-frame queue monitoring.
//!
//! `QueueMonitor` owns everything a run needs (detector, zones, annotator) so
//! that tests can drive it with scripted detectors and synthetic video. Frames
//! are processed strictly in order; nothing carries over between frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbImage;

use crate::annotate::{FrameAnnotator, OverlayLine};
use crate::detect::{DetectorBackend, PixelBox};
use crate::error::{ErrorKind, MonitorError};
use crate::ingest::VideoSource;
use crate::sink::VideoSink;
use crate::zone::{OccupancyTally, ZoneTracker};

/// What one frame produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub boxes: Vec<PixelBox>,
    pub tally: OccupancyTally,
    pub lines: Vec<OverlayLine>,
}

impl FrameReport {
    pub fn people_in_frame(&self) -> usize {
        self.boxes.len()
    }

    pub fn full_queues(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().filter(|l| l.queue_full).map(|l| l.zone)
    }
}

/// How the frame loop ended.
#[derive(Debug)]
pub struct RunSummary {
    /// Frames read and processed (including one that failed mid-way).
    pub frames: u64,
    /// Frames written to the sink.
    pub frames_written: u64,
    /// Wall-clock time of the loop.
    pub elapsed: Duration,
    /// Set when the loop was cut short by Ctrl-C.
    pub interrupted: bool,
    /// The error that aborted the loop, if any.
    pub aborted: Option<anyhow::Error>,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.aborted.is_none() && !self.interrupted
    }
}

pub struct QueueMonitor {
    detector: Box<dyn DetectorBackend>,
    tracker: ZoneTracker,
    annotator: FrameAnnotator,
    threshold: f32,
    max_people: u32,
}

impl QueueMonitor {
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        tracker: ZoneTracker,
        annotator: FrameAnnotator,
        threshold: f32,
        max_people: u32,
    ) -> Self {
        Self {
            detector,
            tracker,
            annotator,
            threshold,
            max_people,
        }
    }

    pub fn tracker(&self) -> &ZoneTracker {
        &self.tracker
    }

    /// Detect, count and annotate one frame in place.
    pub fn process_frame(&mut self, image: &mut RgbImage) -> Result<FrameReport> {
        let raw = self
            .detector
            .infer(image)
            .with_context(|| format!("{} inference failed", self.detector.name()))?;
        let boxes =
            FrameAnnotator::to_pixel_boxes(&raw, self.threshold, image.width(), image.height());
        self.annotator.draw(image, &boxes);

        let tally = self.tracker.check_coords(&boxes);
        let lines = self.annotator.overlay_text(image, &tally, self.max_people);

        log::debug!("people in frame = {}", boxes.len());
        log::debug!("people in queues = {:?}", tally);

        Ok(FrameReport {
            boxes,
            tally,
            lines,
        })
    }

    /// Run the frame loop until the source is exhausted, `stop` is raised or
    /// a frame fails.
    ///
    /// A failure ends the loop but not the run: frames already written stay
    /// in the sink and the summary still reports them. The sink is finished
    /// before returning.
    pub fn run(
        &mut self,
        source: &mut VideoSource,
        sink: &mut VideoSink,
        stop: &AtomicBool,
    ) -> RunSummary {
        self.run_with(source, sink, stop, |_, _| {})
    }

    /// Like `run`, calling `on_frame` with the frame index and report after
    /// each frame is written.
    pub fn run_with<F>(
        &mut self,
        source: &mut VideoSource,
        sink: &mut VideoSink,
        stop: &AtomicBool,
        mut on_frame: F,
    ) -> RunSummary
    where
        F: FnMut(u64, &FrameReport),
    {
        let started = Instant::now();
        let mut frames = 0u64;
        let mut interrupted = false;
        let mut aborted = None;

        loop {
            if stop.load(Ordering::SeqCst) {
                log::warn!("stop requested after {} frames", frames);
                interrupted = true;
                break;
            }

            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    aborted = Some(frame_failure(e.context("failed to read frame")));
                    break;
                }
            };
            frames += 1;

            let result = self
                .process_frame(&mut frame.image)
                .and_then(|report| {
                    sink.write(&frame.image)
                        .context("failed to write annotated frame")?;
                    Ok(report)
                })
                .with_context(|| format!("frame {}", frame.index));

            match result {
                Ok(report) => {
                    for zone in report.full_queues() {
                        log::debug!("frame {}: queue {} full", frame.index, zone);
                    }
                    on_frame(frame.index, &report);
                }
                Err(e) => {
                    aborted = Some(frame_failure(e));
                    break;
                }
            }
        }

        let elapsed = started.elapsed();

        if let Err(e) = sink.finish() {
            let e = frame_failure(e.context("failed to finalize output video"));
            aborted.get_or_insert(e);
        }
        if let Some(e) = &aborted {
            log::error!("could not run inference: {:#}", e);
        }

        RunSummary {
            frames,
            frames_written: sink.frames_written(),
            elapsed,
            interrupted,
            aborted,
        }
    }
}

fn frame_failure(err: anyhow::Error) -> anyhow::Error {
    MonitorError::wrap(ErrorKind::FrameInference, err)
}
