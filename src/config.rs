use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::zone::ContainmentMode;

const DEFAULT_DEVICE: &str = "CPU";
const DEFAULT_OUTPUT_DIR: &str = "/results";
const DEFAULT_MAX_PEOPLE: u32 = 2;
const DEFAULT_THRESHOLD: f32 = 0.60;
const DEFAULT_INPUT_WIDTH: u32 = 544;
const DEFAULT_INPUT_HEIGHT: u32 = 320;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "QUEUE_MONITOR_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MonitorConfigFile {
    model: Option<String>,
    device: Option<String>,
    video: Option<String>,
    queue_param: Option<PathBuf>,
    output_path: Option<PathBuf>,
    max_people: Option<u32>,
    threshold: Option<f32>,
    font: Option<PathBuf>,
    containment: Option<String>,
    input: Option<InputSizeFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct InputSizeFile {
    width: Option<u32>,
    height: Option<u32>,
}

/// Values given on the command line. They win over the file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub device: Option<String>,
    pub video: Option<String>,
    pub queue_param: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub max_people: Option<u32>,
    pub threshold: Option<f32>,
    pub font: Option<PathBuf>,
    pub containment: Option<String>,
    pub input_width: Option<u32>,
    pub input_height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Detection model path (`stub://...` selects the scripted backend).
    pub model: String,
    /// Execution device identifier.
    pub device: String,
    /// Input video path (`stub://...` selects a synthetic stream).
    pub video: String,
    /// Zone-parameter file; no zones when absent.
    pub queue_param: Option<PathBuf>,
    /// Directory receiving the output video and stats report.
    pub output_path: PathBuf,
    /// Occupancy at which a queue is reported full.
    pub max_people: u32,
    /// Minimum detection confidence, inclusive.
    pub threshold: f32,
    pub font: Option<PathBuf>,
    pub containment: ContainmentMode,
    pub input_width: u32,
    pub input_height: u32,
}

impl MonitorConfig {
    /// Load configuration: optional JSON file, then `QUEUE_MONITOR_*`
    /// environment, then command-line overrides. Validated last.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => read_config_file(path)?,
            None => MonitorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.apply_overrides(overrides)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let containment = match file.containment.as_deref() {
            Some(mode) => ContainmentMode::parse(mode)?,
            None => ContainmentMode::default(),
        };
        Ok(Self {
            model: file.model.unwrap_or_default(),
            device: file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            video: file.video.unwrap_or_default(),
            queue_param: file.queue_param,
            output_path: file
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_people: file.max_people.unwrap_or(DEFAULT_MAX_PEOPLE),
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            font: file.font,
            containment,
            input_width: file
                .input
                .as_ref()
                .and_then(|input| input.width)
                .unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: file
                .input
                .and_then(|input| input.height)
                .unwrap_or(DEFAULT_INPUT_HEIGHT),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(model) = env_value("QUEUE_MONITOR_MODEL") {
            self.model = model;
        }
        if let Some(device) = env_value("QUEUE_MONITOR_DEVICE") {
            self.device = device;
        }
        if let Some(video) = env_value("QUEUE_MONITOR_VIDEO") {
            self.video = video;
        }
        if let Some(path) = env_value("QUEUE_MONITOR_QUEUE_PARAM") {
            self.queue_param = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("QUEUE_MONITOR_OUTPUT_PATH") {
            self.output_path = PathBuf::from(path);
        }
        if let Some(max_people) = env_value("QUEUE_MONITOR_MAX_PEOPLE") {
            self.max_people = max_people
                .parse()
                .map_err(|_| anyhow!("QUEUE_MONITOR_MAX_PEOPLE must be a positive integer"))?;
        }
        if let Some(threshold) = env_value("QUEUE_MONITOR_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("QUEUE_MONITOR_THRESHOLD must be a number in [0, 1]"))?;
        }
        if let Some(mode) = env_value("QUEUE_MONITOR_CONTAINMENT") {
            self.containment = ContainmentMode::parse(&mode)?;
        }
        if let Some(path) = env_value("QUEUE_MONITOR_FONT") {
            self.font = Some(PathBuf::from(path));
        }
        if let Some(width) = env_value("QUEUE_MONITOR_INPUT_WIDTH") {
            self.input_width = width
                .parse()
                .map_err(|_| anyhow!("QUEUE_MONITOR_INPUT_WIDTH must be a positive integer"))?;
        }
        if let Some(height) = env_value("QUEUE_MONITOR_INPUT_HEIGHT") {
            self.input_height = height
                .parse()
                .map_err(|_| anyhow!("QUEUE_MONITOR_INPUT_HEIGHT must be a positive integer"))?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(video) = overrides.video {
            self.video = video;
        }
        if overrides.queue_param.is_some() {
            self.queue_param = overrides.queue_param;
        }
        if let Some(path) = overrides.output_path {
            self.output_path = path;
        }
        if let Some(max_people) = overrides.max_people {
            self.max_people = max_people;
        }
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if overrides.font.is_some() {
            self.font = overrides.font;
        }
        if let Some(mode) = overrides.containment {
            self.containment = ContainmentMode::parse(&mode)?;
        }
        if let Some(width) = overrides.input_width {
            self.input_width = width;
        }
        if let Some(height) = overrides.input_height {
            self.input_height = height;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("a model path is required (--model)"));
        }
        if self.video.trim().is_empty() {
            return Err(anyhow!("a video path is required (--video)"));
        }
        if self.device.trim().is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if self.max_people == 0 {
            return Err(anyhow!("max_people must be at least 1"));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}
