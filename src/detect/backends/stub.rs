use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionTensor;

/// Stub backend for tests and synthetic runs.
///
/// Replays scripted tensors in order and wraps around when they run out. An
/// empty script yields empty tensors.
pub struct StubBackend {
    script: Vec<DetectionTensor>,
    calls: u64,
    fail_at: Option<u64>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<DetectionTensor>) -> Self {
        Self {
            script,
            calls: 0,
            fail_at: None,
        }
    }

    /// Make the `call`-th inference (1-based) fail.
    pub fn failing_at(mut self, call: u64) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports_device(&self, _device: &str) -> bool {
        true
    }

    fn infer(&mut self, _frame: &RgbImage) -> Result<DetectionTensor> {
        self.calls += 1;
        if self.fail_at == Some(self.calls) {
            return Err(anyhow!("stub inference failure on call {}", self.calls));
        }
        if self.script.is_empty() {
            return Ok(DetectionTensor::empty());
        }
        let idx = ((self.calls - 1) % self.script.len() as u64) as usize;
        Ok(self.script[idx].clone())
    }
}
