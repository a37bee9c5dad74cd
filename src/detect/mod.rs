//! Person detection backends.
//!
//! The model itself is an external collaborator behind `DetectorBackend`.
//! `load_detector` picks a backend for a model path and checks that it can run
//! on the requested device.

mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

use crate::error::{ErrorKind, MonitorError};

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{Detection, DetectionTensor, PixelBox, MIN_RECORD_LEN};

/// Model paths with this prefix select the scripted stub backend.
pub const STUB_MODEL_PREFIX: &str = "stub://";

/// Load the detector for `model_path` and bind it to `device`.
///
/// Every failure is reported as `ErrorKind::ModelInit`.
pub fn load_detector(
    model_path: &str,
    device: &str,
    input_width: u32,
    input_height: u32,
) -> Result<Box<dyn DetectorBackend>> {
    let mut backend = open_backend(model_path, input_width, input_height)
        .map_err(|e| MonitorError::wrap(ErrorKind::ModelInit, e))?;

    if !backend.supports_device(device) {
        return Err(MonitorError::new(
            ErrorKind::ModelInit,
            format!(
                "backend '{}' cannot run on device '{}'",
                backend.name(),
                device
            ),
        )
        .into());
    }

    backend
        .warm_up()
        .map_err(|e| MonitorError::wrap(ErrorKind::ModelInit, e))?;
    log::info!("detector backend '{}' ready on {}", backend.name(), device);
    Ok(backend)
}

fn open_backend(
    model_path: &str,
    input_width: u32,
    input_height: u32,
) -> Result<Box<dyn DetectorBackend>> {
    if model_path.trim().is_empty() {
        return Err(anyhow!("model path is empty"));
    }
    if model_path.starts_with(STUB_MODEL_PREFIX) {
        return Ok(Box::new(StubBackend::new()));
    }

    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(TractBackend::new(
            model_path,
            input_width,
            input_height,
        )?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        let _ = (input_width, input_height);
        Err(anyhow!(
            "loading '{}' requires the backend-tract feature",
            model_path
        ))
    }
}
