//! Throughput statistics for a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// File name of the statistics report inside the output directory.
pub const STATS_FILE_NAME: &str = "stats.txt";

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunStats {
    /// Wall-clock time to load and prepare the model.
    pub model_load: Duration,
    /// Wall-clock time of the frame loop.
    pub inference: Duration,
    /// Frames taken through the loop.
    pub frames: u64,
}

impl RunStats {
    /// Inference time in seconds, rounded to one decimal.
    pub fn total_inference_secs(&self) -> f64 {
        (self.inference.as_secs_f64() * 10.0).round() / 10.0
    }

    /// Frames per second over the rounded inference time.
    ///
    /// Falls back to the unrounded time for sub-50ms runs, and to 0 when no
    /// time elapsed at all.
    pub fn fps(&self) -> f64 {
        let rounded = self.total_inference_secs();
        let secs = if rounded > 0.0 {
            rounded
        } else {
            self.inference.as_secs_f64()
        };
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    /// The three report lines: inference seconds, fps, model load seconds.
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            report_number(self.total_inference_secs()),
            report_number(self.fps()),
            report_number(self.model_load.as_secs_f64())
        )
    }

    /// Write `stats.txt` into `dir` and return its path.
    pub fn write_report(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(STATS_FILE_NAME);
        std::fs::write(&path, self.render())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Shortest round-trip form, keeping one decimal on whole numbers (`4.0`).
fn report_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
