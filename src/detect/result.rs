use anyhow::{anyhow, Result};

/// Fields every detection record must carry:
/// `[batch_id, class_id, confidence, x_min, y_min, x_max, y_max]`.
pub const MIN_RECORD_LEN: usize = 7;

const CONFIDENCE: usize = 2;
const X_MIN: usize = 3;
const Y_MIN: usize = 4;
const X_MAX: usize = 5;
const Y_MAX: usize = 6;

/// Raw detector output: a flat buffer of fixed-length records.
///
/// Records may be longer than `MIN_RECORD_LEN`; trailing fields are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionTensor {
    data: Vec<f32>,
    record_len: usize,
}

impl DetectionTensor {
    pub fn new(data: Vec<f32>, record_len: usize) -> Result<Self> {
        if record_len < MIN_RECORD_LEN {
            return Err(anyhow!(
                "detection records need at least {} fields, got {}",
                MIN_RECORD_LEN,
                record_len
            ));
        }
        if data.len() % record_len != 0 {
            return Err(anyhow!(
                "detection buffer of {} values is not a whole number of {}-field records",
                data.len(),
                record_len
            ));
        }
        Ok(Self { data, record_len })
    }

    /// Build a tensor from 7-field records.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = [f32; MIN_RECORD_LEN]>,
    {
        let data = records.into_iter().flatten().collect();
        Self {
            data,
            record_len: MIN_RECORD_LEN,
        }
    }

    pub fn empty() -> Self {
        Self::from_records(std::iter::empty())
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn len(&self) -> usize {
        if self.record_len == 0 {
            0
        } else {
            self.data.len() / self.record_len
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records decoded into detections, in model output order.
    pub fn detections(&self) -> impl Iterator<Item = Detection> + '_ {
        self.data
            .chunks_exact(self.record_len.max(1))
            .map(|record| Detection {
                confidence: record[CONFIDENCE],
                x_min: record[X_MIN],
                y_min: record[Y_MIN],
                x_max: record[X_MAX],
                y_max: record[Y_MAX],
            })
    }
}

/// A single detection with normalized (0..1) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Detection {
    /// Scale to pixel coordinates, truncating toward zero.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let w = frame_width as f32;
        let h = frame_height as f32;
        PixelBox {
            x_min: (self.x_min * w) as i32,
            y_min: (self.y_min * h) as i32,
            x_max: (self.x_max * w) as i32,
            y_max: (self.y_max * h) as i32,
        }
    }
}

/// A detection in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl PixelBox {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_records() {
        assert!(DetectionTensor::new(vec![0.0; 12], 6).is_err());
    }

    #[test]
    fn rejects_ragged_buffer() {
        assert!(DetectionTensor::new(vec![0.0; 15], 7).is_err());
    }

    #[test]
    fn ignores_trailing_fields() {
        let tensor = DetectionTensor::new(
            vec![
                0.0, 1.0, 0.9, 0.1, 0.2, 0.3, 0.4, 42.0, //
                0.0, 1.0, 0.5, 0.5, 0.6, 0.7, 0.8, 43.0,
            ],
            8,
        )
        .unwrap();
        let dets: Vec<_> = tensor.detections().collect();
        assert_eq!(tensor.len(), 2);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[1].x_min, 0.5);
        assert_eq!(dets[1].y_max, 0.8);
    }

    #[test]
    fn pixel_scaling_truncates() {
        let det = Detection {
            confidence: 1.0,
            x_min: 0.1,
            y_min: 0.2,
            x_max: 0.5,
            y_max: 0.6,
        };
        assert_eq!(det.to_pixels(1000, 500), PixelBox::new(100, 100, 500, 300));
        assert_eq!(det.to_pixels(15, 15), PixelBox::new(1, 3, 7, 9));
    }
}
