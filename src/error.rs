//! Failure kinds for a monitoring run.
//!
//! Errors travel as `anyhow::Error`. Setup and per-frame failures are wrapped in
//! a `MonitorError` so callers can tell them apart with `kind_of`.

use std::fmt;

/// What stage of a run failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The detection model could not be loaded or targeted at the device.
    ModelInit,
    /// The zone-parameter file is missing or malformed.
    ZoneParamLoad,
    /// The input video could not be opened.
    VideoOpen,
    /// The output video could not be created.
    VideoWrite,
    /// Prediction, rendering or writing failed for a frame.
    FrameInference,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ModelInit => "MODEL_INIT",
            ErrorKind::ZoneParamLoad => "ZONE_PARAM_LOAD",
            ErrorKind::VideoOpen => "VIDEO_OPEN",
            ErrorKind::VideoWrite => "VIDEO_WRITE",
            ErrorKind::FrameInference => "FRAME_INFERENCE",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MonitorError {
    pub kind: ErrorKind,
    pub message: String,
}

impl MonitorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wrap an existing error chain, keeping its full message.
    pub fn wrap(kind: ErrorKind, err: anyhow::Error) -> anyhow::Error {
        Self::new(kind, format!("{:#}", err)).into()
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}
impl std::error::Error for MonitorError {}

/// Returns the failure kind if the error chain carries a `MonitorError`.
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<MonitorError>())
        .map(|e| e.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_survives_added_context() {
        let err: anyhow::Error = MonitorError::new(ErrorKind::VideoOpen, "no such file").into();
        let err = Err::<(), _>(err).context("opening input").unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::VideoOpen));
    }

    #[test]
    fn wrap_keeps_message_chain() {
        let inner = anyhow::anyhow!("bad header").context("read model.onnx");
        let err = MonitorError::wrap(ErrorKind::ModelInit, inner);
        assert_eq!(err.to_string(), "MODEL_INIT: read model.onnx: bad header");
        assert_eq!(kind_of(&err), Some(ErrorKind::ModelInit));
    }

    #[test]
    fn plain_errors_have_no_kind() {
        let err = anyhow::anyhow!("threshold out of range");
        assert_eq!(kind_of(&err), None);
    }
}
