use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::counter::{CounterError, CrossingConfig, Direction, DwellConfig};
use crate::sink::EmitterConfig;
use crate::utils::{BBox, Rotation};

/// Which counting policy a camera runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Line,
    Dwell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub pos: f32,
    pub arm_px: f32,
    pub cross_tol_px: f32,
    pub min_box_h_px: f32,
    /// Direction of tracks coming from the left
    pub dir_lr: Direction,
    /// Direction of tracks coming from the right
    pub dir_rl: Direction,
}

impl Default for LineConfig {
    fn default() -> Self {
        let defaults = CrossingConfig::default();
        Self {
            pos: defaults.line_pos,
            arm_px: defaults.arm_distance,
            cross_tol_px: defaults.cross_tolerance,
            min_box_h_px: defaults.min_box_height,
            dir_lr: defaults.dir_left_to_right,
            dir_rl: defaults.dir_right_to_left,
        }
    }
}

impl LineConfig {
    pub fn to_crossing_config(&self) -> CrossingConfig {
        CrossingConfig {
            line_pos: self.pos,
            arm_distance: self.arm_px,
            cross_tolerance: self.cross_tol_px,
            min_box_height: self.min_box_h_px,
            dir_left_to_right: self.dir_lr,
            dir_right_to_left: self.dir_rl,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueConfig {
    pub track_ttl_seconds: f64,
    pub gc_interval_seconds: f64,
}

impl Default for UniqueConfig {
    fn default() -> Self {
        Self {
            track_ttl_seconds: 25.0,
            gc_interval_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellSection {
    pub roi_service: BBox,
    pub dwell_frames: u32,
    pub cooldown_seconds: f64,
}

impl Default for DwellSection {
    fn default() -> Self {
        let defaults = DwellConfig::default();
        Self {
            roi_service: defaults.region,
            dwell_frames: defaults.dwell_frames,
            cooldown_seconds: defaults.cooldown_seconds,
        }
    }
}

impl DwellSection {
    pub fn to_dwell_config(&self) -> DwellConfig {
        DwellConfig {
            region: self.roi_service,
            dwell_frames: self.dwell_frames,
            cooldown_seconds: self.cooldown_seconds,
        }
    }
}

/// Event ingestion API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
        }
    }
}

/// Third-party accounting endpoint that receives accumulated counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub base_url: String,
    pub base_datos_cliente: String,
    pub casi_cod: String,
    pub lect_cod: String,
    #[serde(rename = "pass")]
    pub password: String,
    #[serde(default = "default_relay_timeout")]
    pub timeout_seconds: f64,
}

fn default_relay_timeout() -> f64 {
    15.0
}

/// Shortest interval or timeout accepted anywhere in the configuration
pub const MIN_DURATION_SECONDS: f64 = 0.001;

// Finite, and long enough not to round down to a zero `Duration`
fn is_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= MIN_DURATION_SECONDS
}

/// Everything one camera needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub camera_id: String,
    pub rotate_deg: i32,
    pub strategy: StrategyKind,
    pub line: LineConfig,
    pub unique: UniqueConfig,
    pub dwell: DwellSection,
    pub backend: BackendConfig,
    pub emitter: EmitterConfig,
    pub relay: Option<RelayConfig>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            camera_id: "CAM-PC-01".to_string(),
            rotate_deg: 0,
            strategy: StrategyKind::default(),
            line: LineConfig::default(),
            unique: UniqueConfig::default(),
            dwell: DwellSection::default(),
            backend: BackendConfig::default(),
            emitter: EmitterConfig::default(),
            relay: None,
        }
    }
}

impl CounterConfig {
    /// Reads YAML file and validates it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CounterError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
    pub fn from_yaml_str(contents: &str) -> Result<Self, CounterError> {
        let config: CounterConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
    /// Rejects geometry and thresholds the counter cannot work with
    pub fn validate(&self) -> Result<(), CounterError> {
        let bad = |msg: String| Err(CounterError::Config(msg));
        Rotation::try_from(self.rotate_deg)?;
        if self.camera_id.trim().is_empty() {
            return bad("camera_id must not be empty".to_string());
        }
        if !is_duration(self.unique.track_ttl_seconds) {
            return bad(format!(
                "unique.track_ttl_seconds must be a finite number of at least {}s. Got: {}",
                MIN_DURATION_SECONDS, self.unique.track_ttl_seconds
            ));
        }
        if !is_duration(self.unique.gc_interval_seconds) {
            return bad(format!(
                "unique.gc_interval_seconds must be a finite number of at least {}s. Got: {}",
                MIN_DURATION_SECONDS, self.unique.gc_interval_seconds
            ));
        }
        match self.strategy {
            StrategyKind::Line => {
                let line = &self.line;
                if !(0.0..=1.0).contains(&line.pos) {
                    return bad(format!("line.pos must be within [0, 1]. Got: {}", line.pos));
                }
                if line.cross_tol_px < 0.0 || line.min_box_h_px < 0.0 {
                    return bad("line thresholds must not be negative".to_string());
                }
                if line.cross_tol_px >= line.arm_px {
                    return bad(format!(
                        "line.cross_tol_px ({}) must be smaller than line.arm_px ({})",
                        line.cross_tol_px, line.arm_px
                    ));
                }
            }
            StrategyKind::Dwell => {
                let dwell = &self.dwell;
                if dwell.roi_service.is_degenerate() {
                    return bad(format!(
                        "dwell.roi_service is empty: {}",
                        dwell.roi_service
                    ));
                }
                if dwell.dwell_frames == 0 {
                    return bad("dwell.dwell_frames must be at least 1".to_string());
                }
                if dwell.cooldown_seconds < 0.0 {
                    return bad("dwell.cooldown_seconds must not be negative".to_string());
                }
            }
        }
        if self.emitter.queue_capacity == 0 {
            return bad("emitter.queue_capacity must be at least 1".to_string());
        }
        if self.emitter.timeout_ms == 0 {
            return bad("emitter.timeout_ms must be at least 1".to_string());
        }
        if let Some(ref relay) = self.relay {
            if !is_duration(relay.timeout_seconds) {
                return bad(format!(
                    "relay.timeout_seconds must be a finite number of at least {}s. Got: {}",
                    MIN_DURATION_SECONDS, relay.timeout_seconds
                ));
            }
        }
        Ok(())
    }
}
