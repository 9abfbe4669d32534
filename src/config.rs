//! Daemon configuration.
//!
//! Layered like the rest of the deployment tooling expects: compiled-in
//! defaults, then an optional JSON file named by `SAFEGUARD_CONFIG`, then
//! `SAFEGUARD_*` environment overrides, then validation. The loaded
//! `MonitorConfig` is immutable for the life of the process.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{PpeConfig, DEFAULT_ZONE_FRACTION};

const DEFAULT_DB_PATH: &str = "safeguard.db";
const DEFAULT_API_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_CAPTURE_DIR: &str = "static/captures";
const DEFAULT_COOLDOWN_SECS: u64 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DETECTOR_BACKEND: &str = "blob";
const DEFAULT_DETECTOR_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

fn default_candidates() -> Vec<String> {
    vec![
        "/dev/video0".to_string(),
        "/dev/video1".to_string(),
        "synthetic".to_string(),
    ]
}

// ----------------------------------------------------------------------------
// File schema (everything optional; absent sections fall back to defaults)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    db_path: Option<String>,
    api: Option<ApiConfigFile>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    zone_fraction: Option<f32>,
    alerts: Option<AlertConfigFile>,
    ppe: Option<PpeConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    candidates: Option<Vec<String>>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    startup_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<u64>,
    capture_dir: Option<String>,
}

// ----------------------------------------------------------------------------
// Resolved configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub db_path: String,
    pub api_addr: String,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    /// Fraction of the frame width where the danger zone begins.
    pub zone_fraction: f32,
    pub cooldown: Duration,
    pub capture_dir: PathBuf,
    pub ppe: PpeConfig,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Capture sources tried in order; "synthetic" is the builtin fallback.
    pub candidates: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub startup_timeout_secs: u64,
}

impl CameraSettings {
    /// How long a candidate source gets to deliver its first frame.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            target_fps: DEFAULT_CAMERA_FPS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR_BACKEND.to_string(),
            model_path: None,
            input_width: DEFAULT_DETECTOR_INPUT,
            input_height: DEFAULT_DETECTOR_INPUT,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            api_addr: DEFAULT_API_ADDR.to_string(),
            camera: CameraSettings::default(),
            detector: DetectorSettings::default(),
            zone_fraction: DEFAULT_ZONE_FRACTION,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            ppe: PpeConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SAFEGUARD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Self {
        let defaults = Self::default();
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let alerts = file.alerts.unwrap_or_default();
        Self {
            db_path: file.db_path.unwrap_or(defaults.db_path),
            api_addr: file
                .api
                .and_then(|api| api.addr)
                .unwrap_or(defaults.api_addr),
            camera: CameraSettings {
                candidates: camera.candidates.unwrap_or(defaults.camera.candidates),
                width: camera.width.unwrap_or(defaults.camera.width),
                height: camera.height.unwrap_or(defaults.camera.height),
                target_fps: camera.target_fps.unwrap_or(defaults.camera.target_fps),
                startup_timeout_secs: camera
                    .startup_timeout_secs
                    .unwrap_or(defaults.camera.startup_timeout_secs),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(defaults.detector.backend),
                model_path: detector.model_path,
                input_width: detector.input_width.unwrap_or(defaults.detector.input_width),
                input_height: detector
                    .input_height
                    .unwrap_or(defaults.detector.input_height),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
            },
            zone_fraction: file.zone_fraction.unwrap_or(defaults.zone_fraction),
            cooldown: alerts
                .cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cooldown),
            capture_dir: alerts
                .capture_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.capture_dir),
            ppe: file.ppe.unwrap_or(defaults.ppe),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SAFEGUARD_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("SAFEGUARD_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(candidates) = std::env::var("SAFEGUARD_CAMERA_CANDIDATES") {
            let parsed = split_csv(&candidates);
            if !parsed.is_empty() {
                self.camera.candidates = parsed;
            }
        }
        if let Ok(fraction) = std::env::var("SAFEGUARD_ZONE_FRACTION") {
            self.zone_fraction = fraction
                .parse()
                .map_err(|_| anyhow!("SAFEGUARD_ZONE_FRACTION must be a number"))?;
        }
        if let Ok(cooldown) = std::env::var("SAFEGUARD_COOLDOWN_SECS") {
            let seconds: u64 = cooldown.parse().map_err(|_| {
                anyhow!("SAFEGUARD_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.cooldown = Duration::from_secs(seconds);
        }
        if let Ok(dir) = std::env::var("SAFEGUARD_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.candidates.is_empty() {
            return Err(anyhow!("camera.candidates must name at least one source"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera.target_fps must be greater than zero"));
        }
        if !(self.zone_fraction > 0.0 && self.zone_fraction <= 1.0) {
            return Err(anyhow!("zone_fraction must be within (0, 1]"));
        }
        if !(self.ppe.density_threshold >= 0.0 && self.ppe.density_threshold < 1.0) {
            return Err(anyhow!("ppe.density_threshold must be within [0, 1)"));
        }
        if self.detector.backend.trim().is_empty() {
            return Err(anyhow!("detector.backend must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "SAFEGUARD_CONFIG",
            "SAFEGUARD_API_ADDR",
            "SAFEGUARD_DB_PATH",
            "SAFEGUARD_CAMERA_CANDIDATES",
            "SAFEGUARD_ZONE_FRACTION",
            "SAFEGUARD_COOLDOWN_SECS",
            "SAFEGUARD_CAPTURE_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults_without_file_or_env() -> Result<()> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let cfg = MonitorConfig::load()?;
        assert_eq!(cfg.db_path, "safeguard.db");
        assert_eq!(cfg.api_addr, "0.0.0.0:5000");
        assert_eq!(cfg.camera.candidates.last().map(String::as_str), Some("synthetic"));
        assert_eq!(cfg.zone_fraction, DEFAULT_ZONE_FRACTION);
        assert_eq!(cfg.cooldown, Duration::from_secs(30));
        assert_eq!(cfg.detector.backend, "blob");
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{
                "db_path": "plant_floor.db",
                "api": {{ "addr": "127.0.0.1:9100" }},
                "camera": {{ "candidates": ["/dev/video9"], "width": 1280, "height": 720 }},
                "zone_fraction": 0.5,
                "alerts": {{ "cooldown_secs": 10, "capture_dir": "evidence" }}
            }}"#
        )?;
        std::env::set_var("SAFEGUARD_CONFIG", file.path());

        let cfg = MonitorConfig::load()?;
        assert_eq!(cfg.db_path, "plant_floor.db");
        assert_eq!(cfg.api_addr, "127.0.0.1:9100");
        assert_eq!(cfg.camera.candidates, vec!["/dev/video9"]);
        assert_eq!(cfg.camera.width, 1280);
        assert_eq!(cfg.camera.target_fps, 30);
        assert_eq!(cfg.zone_fraction, 0.5);
        assert_eq!(cfg.cooldown, Duration::from_secs(10));
        assert_eq!(cfg.capture_dir, PathBuf::from("evidence"));

        clear_env();
        Ok(())
    }

    #[test]
    fn env_overrides_beat_file_values() -> Result<()> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "db_path": "from_file.db" }}"#)?;
        std::env::set_var("SAFEGUARD_CONFIG", file.path());
        std::env::set_var("SAFEGUARD_DB_PATH", "from_env.db");
        std::env::set_var("SAFEGUARD_CAMERA_CANDIDATES", "/dev/video2, synthetic");
        std::env::set_var("SAFEGUARD_COOLDOWN_SECS", "45");

        let cfg = MonitorConfig::load()?;
        assert_eq!(cfg.db_path, "from_env.db");
        assert_eq!(cfg.camera.candidates, vec!["/dev/video2", "synthetic"]);
        assert_eq!(cfg.cooldown, Duration::from_secs(45));

        clear_env();
        Ok(())
    }

    #[test]
    fn zone_fraction_out_of_range_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("SAFEGUARD_ZONE_FRACTION", "1.5");

        assert!(MonitorConfig::load().is_err());
        clear_env();
    }
}
