use anyhow::Result;
use image::RgbImage;

use crate::detect::result::DetectionTensor;

/// Detector backend trait.
///
/// A backend wraps a pretrained detection model. It receives the full decoded
/// frame and returns the model's raw detection records; thresholding and
/// pixel scaling happen downstream in `FrameAnnotator`.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend can execute on the named device (e.g. `CPU`).
    fn supports_device(&self, device: &str) -> bool;

    /// Run the model on a frame.
    ///
    /// Implementations must not retain the frame past the call.
    fn infer(&mut self, frame: &RgbImage) -> Result<DetectionTensor>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
