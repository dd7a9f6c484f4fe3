use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DepthLinkError;
use crate::types::{AxisConvention, FrameMode};

pub const CONFIG_ENV: &str = "DEPTHLINK_CONFIG";

// MARK: - SampleParams

/// Decode resolution and depth scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleParams {
    /// Pixel stride; larger means fewer, coarser points.
    pub step: u32,
    /// Metres mapped onto the hue range `[0, 1]`.
    #[serde(alias = "depthRange")]
    pub depth_range: f32,
}

impl SampleParams {
    pub const STEP_RANGE: (u32, u32) = (1, 16);
    pub const DEPTH_RANGE: (f32, f32) = (0.5, 10.0);

    pub fn new(step: u32, depth_range: f32) -> Self {
        Self { step, depth_range }
    }

    /// Clamp to the ranges the viewer's controls allow. A zero step or a
    /// zero/NaN depth range falls back to the default; anything else, negative
    /// values included, is clamped.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let step = if self.step == 0 {
            defaults.step
        } else {
            self.step.clamp(Self::STEP_RANGE.0, Self::STEP_RANGE.1)
        };
        let depth_range = if self.depth_range.is_nan() || self.depth_range == 0.0 {
            defaults.depth_range
        } else {
            self.depth_range.clamp(Self::DEPTH_RANGE.0, Self::DEPTH_RANGE.1)
        };
        Self { step, depth_range }
    }
}

impl Default for SampleParams {
    fn default() -> Self {
        Self { step: 4, depth_range: 3.0 }
    }
}

// MARK: - Sketch

/// Which demo the viewer opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sketch {
    #[default]
    LidarBasic,
    LidarBasicSound,
}

/// Presentation choices a sketch implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchPreset {
    pub axes: AxisConvention,
    pub audio_reactive: bool,
    /// Damped orbit controls instead of the lightweight turntable.
    pub orbit_controls: bool,
    /// Step and depth-range sliders next to point size and tint.
    pub sample_controls: bool,
}

impl Sketch {
    pub fn preset(self) -> SketchPreset {
        match self {
            Self::LidarBasic => SketchPreset {
                axes: AxisConvention::FacingViewer,
                audio_reactive: false,
                orbit_controls: false,
                sample_controls: false,
            },
            Self::LidarBasicSound => SketchPreset {
                axes: AxisConvention::QuarterTurn,
                audio_reactive: true,
                orbit_controls: true,
                sample_controls: true,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LidarBasic => "lidar-basic",
            Self::LidarBasicSound => "lidar-basic-sound",
        }
    }
}

impl std::str::FromStr for Sketch {
    type Err = DepthLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lidar-basic" => Ok(Self::LidarBasic),
            "lidar-basic-sound" => Ok(Self::LidarBasicSound),
            other => Err(DepthLinkError::ConfigurationInvalid {
                reason: format!("unknown sketch {other:?} (expected lidar-basic or lidar-basic-sound)"),
            }),
        }
    }
}

// MARK: - SurfaceSize

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

// MARK: - ViewerConfig

/// Everything one viewer session needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    #[serde(alias = "serverAddress")]
    pub server_address: String,
    pub sketch: Sketch,
    pub mode: FrameMode,
    pub sample: SampleParams,
    #[serde(alias = "pointSize")]
    pub point_size: f32,
    pub tint: [f32; 3],
    #[serde(alias = "iceTimeoutMs")]
    pub ice_timeout_ms: u64,
    pub surface: SurfaceSize,
    #[serde(alias = "frameRate")]
    pub frame_rate: u32,
    #[serde(alias = "snapshotDir")]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(alias = "snapshotEverySecs")]
    pub snapshot_every_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost".into(),
            sketch: Sketch::default(),
            mode: FrameMode::DualHalf,
            sample: SampleParams::default(),
            point_size: 0.01,
            tint: [1.0, 1.0, 1.0],
            ice_timeout_ms: 3000,
            surface: SurfaceSize::default(),
            frame_rate: 60,
            snapshot_dir: None,
            snapshot_every_secs: 5,
        }
    }
}

impl ViewerConfig {
    /// Defaults, then the JSON file named by `DEPTHLINK_CONFIG`, then
    /// individual environment overrides.
    pub fn from_env() -> Result<Self, DepthLinkError> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, DepthLinkError> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text).map_err(|e| DepthLinkError::ConfigurationInvalid {
            reason: format!("{}: {e}", path.display()),
        })?;
        info!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Apply `DEPTHLINK_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), DepthLinkError> {
        if let Some(server) = lookup("DEPTHLINK_SERVER") {
            self.server_address = server;
        }
        if let Some(sketch) = lookup("DEPTHLINK_SKETCH") {
            self.sketch = sketch.parse()?;
        }
        if let Some(step) = lookup("DEPTHLINK_STEP") {
            match step.trim().parse() {
                Ok(step) => self.sample.step = step,
                Err(_) => warn!("Ignoring DEPTHLINK_STEP={:?}: not an integer", step),
            }
        }
        if let Some(range) = lookup("DEPTHLINK_DEPTH_RANGE") {
            match range.trim().parse() {
                Ok(range) => self.sample.depth_range = range,
                Err(_) => warn!("Ignoring DEPTHLINK_DEPTH_RANGE={:?}: not a number", range),
            }
        }
        if let Some(dir) = lookup("DEPTHLINK_SNAPSHOT_DIR") {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub const FRAME_RATE_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

    pub fn validate(&self) -> Result<(), DepthLinkError> {
        let invalid = |reason: &str| {
            Err(DepthLinkError::ConfigurationInvalid { reason: reason.to_owned() })
        };
        if !Self::FRAME_RATE_RANGE.contains(&self.frame_rate) {
            return invalid("frameRate must be between 1 and 1000");
        }
        if self.surface.width == 0 || self.surface.height == 0 {
            return invalid("surface dimensions must be > 0");
        }
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            return invalid("pointSize must be a positive number");
        }
        Ok(())
    }

    pub fn ice_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ice_timeout_ms)
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        let rate = self.frame_rate.clamp(*Self::FRAME_RATE_RANGE.start(), *Self::FRAME_RATE_RANGE.end());
        std::time::Duration::from_micros(1_000_000 / rate as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn sanitize_clamps_like_the_controls() {
        assert_eq!(SampleParams::new(0, 3.0).sanitized().step, 4);
        assert_eq!(SampleParams::new(40, 3.0).sanitized().step, 16);
        assert_eq!(SampleParams::new(4, 0.1).sanitized().depth_range, 0.5);
        assert_eq!(SampleParams::new(4, 99.0).sanitized().depth_range, 10.0);
        assert_eq!(SampleParams::new(4, f32::NAN).sanitized().depth_range, 3.0);
        assert_eq!(SampleParams::new(2, 2.0).sanitized(), SampleParams::new(2, 2.0));
    }

    #[test]
    fn negative_depth_range_clamps_to_minimum() {
        assert_eq!(SampleParams::new(4, -2.0).sanitized().depth_range, 0.5);
        assert_eq!(SampleParams::new(4, f32::NEG_INFINITY).sanitized().depth_range, 0.5);
        assert_eq!(SampleParams::new(4, f32::INFINITY).sanitized().depth_range, 10.0);
        assert_eq!(SampleParams::new(4, 0.0).sanitized().depth_range, 3.0);
        assert_eq!(SampleParams::new(4, -0.0).sanitized().depth_range, 3.0);
    }

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "serverAddress": "192.168.0.7:8080",
            "sketch": "lidar-basic-sound",
            "mode": "depth-only",
            "sample": {"step": 2, "depthRange": 5.5},
            "pointSize": 0.02,
            "iceTimeoutMs": 1500
        }"#;

        let cfg: ViewerConfig = serde_json::from_str(json).expect("valid camelCase config");
        assert_eq!(cfg.server_address, "192.168.0.7:8080");
        assert_eq!(cfg.sketch, Sketch::LidarBasicSound);
        assert_eq!(cfg.mode, FrameMode::DepthOnly);
        assert_eq!(cfg.sample, SampleParams::new(2, 5.5));
        assert_eq!(cfg.ice_timeout_ms, 1500);
        // untouched fields keep their defaults
        assert_eq!(cfg.frame_rate, 60);
        assert_eq!(cfg.tint, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn load_from_file_and_reject_garbage() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, r#"{{"server_address": "phone.local", "frame_rate": 30}}"#).unwrap();
        let cfg = ViewerConfig::load(good.path()).unwrap();
        assert_eq!(cfg.server_address, "phone.local");
        assert_eq!(cfg.frame_interval(), std::time::Duration::from_micros(33_333));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(
            ViewerConfig::load(bad.path()),
            Err(DepthLinkError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let vars: HashMap<&str, &str> = [
            ("DEPTHLINK_SERVER", "10.0.0.2:9000"),
            ("DEPTHLINK_SKETCH", "lidar-basic-sound"),
            ("DEPTHLINK_STEP", "8"),
            ("DEPTHLINK_DEPTH_RANGE", "oops"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ViewerConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.server_address, "10.0.0.2:9000");
        assert_eq!(cfg.sketch, Sketch::LidarBasicSound);
        assert_eq!(cfg.sample.step, 8);
        assert_eq!(cfg.sample.depth_range, 3.0);
    }

    #[test]
    fn unknown_sketch_is_a_config_error() {
        let mut cfg = ViewerConfig::default();
        let err = cfg.apply_overrides(|k| (k == "DEPTHLINK_SKETCH").then(|| "paint".to_string()));
        assert!(matches!(err, Err(DepthLinkError::ConfigurationInvalid { .. })));
    }

    #[test]
    fn sketch_presets() {
        let sound = Sketch::LidarBasicSound.preset();
        assert_eq!(sound.axes, AxisConvention::QuarterTurn);
        assert!(sound.audio_reactive);
        assert!(sound.sample_controls);
        assert!(!Sketch::LidarBasic.preset().sample_controls);
        assert!(!Sketch::LidarBasic.preset().audio_reactive);
        assert_eq!(Sketch::LidarBasic.name(), "lidar-basic");
    }

    #[test]
    fn validate_rejects_zero_frame_rate() {
        let cfg = ViewerConfig { frame_rate: 0, ..ViewerConfig::default() };
        assert!(cfg.validate().is_err());
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_bounds_frame_rate() {
        let too_fast = ViewerConfig { frame_rate: 2_000_000, ..ViewerConfig::default() };
        assert!(matches!(too_fast.validate(), Err(DepthLinkError::ConfigurationInvalid { .. })));
        // Never a zero interval, even on an unvalidated config
        assert_eq!(too_fast.frame_interval(), std::time::Duration::from_millis(1));

        let fastest = ViewerConfig { frame_rate: 1000, ..ViewerConfig::default() };
        assert!(fastest.validate().is_ok());
        assert_eq!(fastest.frame_interval(), std::time::Duration::from_millis(1));
    }
}
