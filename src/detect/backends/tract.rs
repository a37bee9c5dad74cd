#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DetectionTensor, MIN_RECORD_LEN};

/// Tract-based backend for ONNX person detectors.
///
/// Expects an SSD-style head whose first output ends in 7-field records
/// (`[1, 1, N, 7]` for the person-detection-retail family). Frames are resized
/// to the model input and fed as NCHW BGR with raw 0..255 values.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// `model_path` may name the file directly or be a stem, in which case
    /// `.onnx` is appended.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = resolve_model_path(model_path.as_ref());
        let model = tract_onnx::onnx()
            .model_for_path(&model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract: loaded {} (input {}x{})",
            model_path.display(),
            width,
            height
        );

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let resized;
        let frame = if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            // Triangle support widens with the downscale ratio: area averaging.
            resized = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
            &resized
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| {
                let px = frame.get_pixel(x as u32, y as u32);
                // BGR plane order.
                px.0[2 - channel] as f32
            },
        );
        input.into_tensor()
    }

    fn extract_records(&self, outputs: TVec<TValue>) -> Result<DetectionTensor> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let record_len = view.shape().last().copied().unwrap_or(0);
        if record_len < MIN_RECORD_LEN {
            return Err(anyhow!(
                "model output shape {:?} does not end in detection records",
                view.shape()
            ));
        }
        DetectionTensor::new(view.iter().copied().collect(), record_len)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports_device(&self, device: &str) -> bool {
        device.eq_ignore_ascii_case("cpu")
    }

    fn infer(&mut self, frame: &RgbImage) -> Result<DetectionTensor> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_records(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.width, self.height);
        self.infer(&blank).map(|_| ())
    }
}

fn resolve_model_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("onnx")
    }
}
