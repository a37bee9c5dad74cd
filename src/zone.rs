//! Queue zones and per-frame occupancy.
//!
//! A `ZoneTracker` owns the configured rectangles and turns the pixel boxes of
//! one frame into an `OccupancyTally`. Nothing is carried between frames.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage, SubImage};
use serde::Deserialize;

use crate::detect::PixelBox;
use crate::error::{ErrorKind, MonitorError};

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "[i32; 4]")]
pub struct Zone {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl Zone {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

impl From<[i32; 4]> for Zone {
    fn from([x_min, y_min, x_max, y_max]: [i32; 4]) -> Self {
        Self::new(x_min, y_min, x_max, y_max)
    }
}

/// How a box is tested against a zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainmentMode {
    /// Only the horizontal span must lie strictly inside the zone.
    /// Deployed zone files are tuned against this test.
    #[default]
    Horizontal,
    /// Both spans must lie strictly inside the zone.
    Full,
}

impl ContainmentMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Self::Horizontal),
            "full" => Ok(Self::Full),
            other => Err(anyhow!(
                "unknown containment mode '{}' (expected 'horizontal' or 'full')",
                other
            )),
        }
    }

    pub fn contains(self, zone: &Zone, b: &PixelBox) -> bool {
        let horizontal = b.x_min > zone.x_min && b.x_max < zone.x_max;
        match self {
            Self::Horizontal => horizontal,
            Self::Full => horizontal && b.y_min > zone.y_min && b.y_max < zone.y_max,
        }
    }
}

/// People counted per zone for one frame, keyed by 1-based zone index.
pub type OccupancyTally = BTreeMap<usize, u32>;

#[derive(Clone, Debug, Default)]
pub struct ZoneTracker {
    zones: Vec<Zone>,
    mode: ContainmentMode,
}

impl ZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_zones<I: IntoIterator<Item = Zone>>(zones: I) -> Self {
        Self {
            zones: zones.into_iter().collect(),
            mode: ContainmentMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ContainmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ContainmentMode {
        self.mode
    }

    /// Append a zone. Ordering, bounds and overlaps are not checked.
    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Count boxes per zone. Every zone is present in the tally, zero or not,
    /// and a box may count toward several overlapping zones.
    pub fn check_coords(&self, boxes: &[PixelBox]) -> OccupancyTally {
        let mut tally: OccupancyTally = (1..=self.zones.len()).map(|k| (k, 0)).collect();
        for b in boxes {
            for (i, zone) in self.zones.iter().enumerate() {
                if self.mode.contains(zone, b) {
                    *tally.entry(i + 1).or_insert(0) += 1;
                }
            }
        }
        tally
    }

    /// Lazily crop each zone out of `image`, in zone order.
    ///
    /// Coordinates are clamped to the image; a zone that is reversed or lies
    /// outside the frame yields an empty crop.
    pub fn iter_zone_crops<'a>(
        &'a self,
        image: &'a RgbImage,
    ) -> impl Iterator<Item = SubImage<&'a RgbImage>> + 'a {
        self.zones.iter().map(move |zone| {
            let (x, y, w, h) = clamp_to_image(zone, image.width(), image.height());
            imageops::crop_imm(image, x, y, w, h)
        })
    }
}

fn clamp_to_image(zone: &Zone, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
    let x0 = clamp(zone.x_min, width);
    let x1 = clamp(zone.x_max, width);
    let y0 = clamp(zone.y_min, height);
    let y1 = clamp(zone.y_max, height);
    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

#[derive(Deserialize)]
struct TomlZoneFile {
    zones: Vec<Zone>,
}

/// Read zone rectangles from a parameter file.
///
/// The format follows the extension: `.npy` holds an N×4 integer array,
/// `.toml` holds `zones = [[x0, y0, x1, y1], ...]`, and anything else is read
/// as a JSON array of the same records. Failures carry
/// `ErrorKind::ZoneParamLoad`.
pub fn load_zone_params(path: &Path) -> Result<Vec<Zone>> {
    read_zone_params(path).map_err(|e| MonitorError::wrap(ErrorKind::ZoneParamLoad, e))
}

fn read_zone_params(path: &Path) -> Result<Vec<Zone>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read zone parameters {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let zones = match ext.as_deref() {
        Some("npy") => parse_npy_zones(&raw),
        Some("toml") => std::str::from_utf8(&raw)
            .map_err(anyhow::Error::from)
            .and_then(|text| Ok(toml::from_str::<TomlZoneFile>(text)?.zones)),
        _ => serde_json::from_slice(&raw).map_err(anyhow::Error::from),
    };
    zones.with_context(|| format!("invalid zone parameters {}", path.display()))
}

fn parse_npy_zones(raw: &[u8]) -> Result<Vec<Zone>> {
    let header = npyz::NpyFile::new(raw).context("not an .npy file")?;
    let shape = header.shape().to_vec();
    let rows = match shape.as_slice() {
        [rows, 4] => *rows,
        [0] => 0,
        other => return Err(anyhow!("expected an N x 4 array, got shape {:?}", other)),
    };

    let values = read_npy_values(raw)?;
    if values.len() as u64 != rows * 4 {
        return Err(anyhow!(
            "array holds {} values, shape needs {}",
            values.len(),
            rows * 4
        ));
    }
    Ok(values
        .chunks_exact(4)
        .map(|c| Zone::new(c[0], c[1], c[2], c[3]))
        .collect())
}

/// Element values of an integer (or whole-number float) array as `i32`.
fn read_npy_values(raw: &[u8]) -> Result<Vec<i32>> {
    macro_rules! try_as {
        ($($t:ty),*) => {$(
            if let Ok(values) = npyz::NpyFile::new(raw).and_then(|f| f.into_vec::<$t>()) {
                return values
                    .into_iter()
                    .map(|v| {
                        i32::try_from(v)
                            .map_err(|_| anyhow!("zone coordinate {} out of range", v))
                    })
                    .collect();
            }
        )*};
    }
    try_as!(i64, i32, i16, i8, u64, u32, u16, u8);

    let floats = npyz::NpyFile::new(raw)
        .and_then(|f| f.into_vec::<f64>())
        .or_else(|_| {
            npyz::NpyFile::new(raw)
                .and_then(|f| f.into_vec::<f32>())
                .map(|v| v.into_iter().map(f64::from).collect())
        })
        .map_err(|_| anyhow!("unsupported .npy element type"))?;
    floats
        .into_iter()
        .map(|v| {
            if v.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&v) {
                Ok(v as i32)
            } else {
                Err(anyhow!("zone coordinate {} is not an integer", v))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use image::{GenericImageView, Rgb};
    use std::io::Write;

    fn queue() -> Zone {
        Zone::new(100, 50, 400, 300)
    }

    #[test]
    fn box_inside_zone_counts_once() {
        let tracker = ZoneTracker::from_zones([queue()]);
        let tally = tracker.check_coords(&[PixelBox::new(150, 100, 350, 250)]);
        assert_eq!(tally, OccupancyTally::from([(1, 1)]));
    }

    #[test]
    fn box_wider_than_zone_does_not_count() {
        let tracker = ZoneTracker::from_zones([queue()]);
        let tally = tracker.check_coords(&[PixelBox::new(50, 100, 450, 250)]);
        assert_eq!(tally, OccupancyTally::from([(1, 0)]));
    }

    #[test]
    fn horizontal_bounds_are_strict() {
        let tracker = ZoneTracker::from_zones([queue()]);
        let touching_left = PixelBox::new(100, 100, 350, 250);
        let touching_right = PixelBox::new(150, 100, 400, 250);
        let tally = tracker.check_coords(&[touching_left, touching_right]);
        assert_eq!(tally[&1], 0);
    }

    #[test]
    fn vertical_extent_is_ignored_by_default() {
        let tracker = ZoneTracker::from_zones([queue()]);
        // Entirely below the zone, horizontally inside it.
        let below = PixelBox::new(150, 900, 350, 1000);
        assert_eq!(tracker.check_coords(&[below])[&1], 1);
    }

    #[test]
    fn full_mode_also_checks_vertical_extent() {
        let tracker = ZoneTracker::from_zones([queue()]).with_mode(ContainmentMode::Full);
        let below = PixelBox::new(150, 900, 350, 1000);
        let inside = PixelBox::new(150, 100, 350, 250);
        assert_eq!(tracker.check_coords(&[below, inside])[&1], 1);
    }

    #[test]
    fn predicate_matches_strict_horizontal_inclusion() {
        let zone = Zone::new(10, 0, 20, 5);
        let tracker = ZoneTracker::from_zones([zone]);
        for x_min in 5..25 {
            for x_max in 5..25 {
                let b = PixelBox::new(x_min, -7, x_max, 99);
                let expected = u32::from(x_min > 10 && x_max < 20);
                assert_eq!(
                    tracker.check_coords(&[b])[&1],
                    expected,
                    "box x=({x_min},{x_max})"
                );
            }
        }
    }

    #[test]
    fn empty_detections_give_zero_for_every_zone() {
        let tracker = ZoneTracker::from_zones([queue(), Zone::new(0, 0, 10, 10), queue()]);
        let tally = tracker.check_coords(&[]);
        assert_eq!(tally, OccupancyTally::from([(1, 0), (2, 0), (3, 0)]));
    }

    #[test]
    fn no_zones_gives_empty_tally() {
        let tracker = ZoneTracker::new();
        assert!(tracker
            .check_coords(&[PixelBox::new(1, 1, 2, 2)])
            .is_empty());
    }

    #[test]
    fn overlapping_zones_both_count_a_box() {
        let mut tracker = ZoneTracker::new();
        tracker.add_zone(Zone::new(0, 0, 500, 500));
        tracker.add_zone(Zone::new(100, 0, 400, 500));
        let tally = tracker.check_coords(&[PixelBox::new(150, 10, 350, 60)]);
        assert_eq!(tally, OccupancyTally::from([(1, 1), (2, 1)]));
    }

    #[test]
    fn check_coords_is_idempotent() {
        let tracker = ZoneTracker::from_zones([queue(), Zone::new(300, 0, 640, 480)]);
        let boxes = [
            PixelBox::new(150, 100, 350, 250),
            PixelBox::new(320, 10, 600, 400),
            PixelBox::new(0, 0, 5, 5),
        ];
        let first = tracker.check_coords(&boxes);
        let second = tracker.check_coords(&boxes);
        assert_eq!(first, second);
        assert_eq!(first, OccupancyTally::from([(1, 1), (2, 1)]));
    }

    #[test]
    fn zone_crops_follow_zone_order() {
        let image = RgbImage::from_fn(100, 80, |x, y| Rgb([x as u8, y as u8, 0]));
        let tracker = ZoneTracker::from_zones([Zone::new(10, 20, 30, 50), Zone::new(0, 0, 5, 5)]);

        let crops: Vec<_> = tracker.iter_zone_crops(&image).collect();
        assert_eq!(crops.len(), 2);
        assert_eq!(crops[0].dimensions(), (20, 30));
        assert_eq!(crops[0].get_pixel(0, 0), Rgb([10, 20, 0]));
        assert_eq!(crops[1].dimensions(), (5, 5));

        // Restartable by calling again.
        assert_eq!(tracker.iter_zone_crops(&image).count(), 2);
    }

    #[test]
    fn zone_crops_clamp_to_image_bounds() {
        let image = RgbImage::new(100, 80);
        let tracker = ZoneTracker::from_zones([
            Zone::new(-10, -10, 50, 500),
            Zone::new(200, 200, 300, 300),
            Zone::new(60, 60, 40, 40),
        ]);
        let dims: Vec<_> = tracker
            .iter_zone_crops(&image)
            .map(|crop| crop.dimensions())
            .collect();
        assert_eq!(dims, vec![(50, 80), (0, 0), (0, 0)]);
    }

    #[test]
    fn containment_mode_parses_names() {
        assert_eq!(ContainmentMode::parse("Full").unwrap(), ContainmentMode::Full);
        assert_eq!(
            ContainmentMode::parse(" horizontal ").unwrap(),
            ContainmentMode::Horizontal
        );
        assert!(ContainmentMode::parse("vertical").is_err());
    }

    #[test]
    fn loads_json_zone_params() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[620, 1, 915, 562], [1000, 1, 1264, 461]]")
            .unwrap();
        let zones = load_zone_params(file.path()).unwrap();
        assert_eq!(
            zones,
            vec![Zone::new(620, 1, 915, 562), Zone::new(1000, 1, 1264, 461)]
        );
    }

    #[test]
    fn loads_toml_zone_params() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"zones = [[15, 180, 730, 780], [921, 144, 1424, 704]]\n")
            .unwrap();
        let zones = load_zone_params(file.path()).unwrap();
        assert_eq!(zones[1], Zone::new(921, 144, 1424, 704));
    }

    /// An `.npy` v1.0 file holding `values` as a C-ordered array.
    fn npy_bytes(descr: &str, shape: &str, data: &[u8]) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
            descr, shape
        );
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');
        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    fn npy_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".npy").tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn loads_npy_zone_params() {
        let data: Vec<u8> = [620i64, 1, 915, 562, 1000, 1, 1264, 461]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let file = npy_file(&npy_bytes("<i8", "(2, 4)", &data));
        let zones = load_zone_params(file.path()).unwrap();
        assert_eq!(
            zones,
            vec![Zone::new(620, 1, 915, 562), Zone::new(1000, 1, 1264, 461)]
        );

        let data: Vec<u8> = [15i32, 180, 730, 780]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let file = npy_file(&npy_bytes("<i4", "(1, 4)", &data));
        assert_eq!(
            load_zone_params(file.path()).unwrap(),
            vec![Zone::new(15, 180, 730, 780)]
        );
    }

    #[test]
    fn npy_zone_params_must_be_n_by_4() {
        let data: Vec<u8> = [1i64, 2, 3, 4, 5, 6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let file = npy_file(&npy_bytes("<i8", "(2, 3)", &data));
        let err = load_zone_params(file.path()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::ZoneParamLoad));

        let data: Vec<u8> = [1.5f64, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let file = npy_file(&npy_bytes("<f8", "(1, 4)", &data));
        assert!(load_zone_params(file.path()).is_err());

        let file = npy_file(b"[[1, 2, 3, 4]]");
        assert!(load_zone_params(file.path()).is_err());
    }

    #[test]
    fn malformed_zone_params_are_zone_param_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[1, 2, 3]]").unwrap();
        let err = load_zone_params(file.path()).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::ZoneParamLoad));

        let missing = Path::new("/nonexistent/queue_param.json");
        let err = load_zone_params(missing).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::ZoneParamLoad));
    }
}
