//! On-disk configuration for the multiplexer daemon
//!
//! A single TOML file under `~/.config/sensormux/` describes where the device
//! nodes live, which vendor library to load and the calibration constants of
//! the chip. Every section falls back to defaults so a partial file is valid.

use crate::sensor::LogicalSensorId;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/sensormux";
const CONFIG_FILE: &str = "config.toml";

const GRAVITY_EARTH: f32 = 9.80665;
// Raw accelerometer counts per g
const ACCEL_LSG: f32 = 720.0;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub device: DeviceConfig,
    pub backend: BackendConfig,
    pub calibration: Calibration,
    pub motion: MotionConfig,
    pub delays: DelayConfig,
    pub poll: PollConfig,
    pub startup: StartupConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Input node the compass daemon publishes on
    pub input_path: PathBuf,
    /// Control node accepting the sampling-period ioctl
    pub control_path: PathBuf,
    /// Raw records buffered per read
    pub read_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("/dev/input/event4"),
            control_path: PathBuf::from("/dev/akm8973_aot"),
            read_capacity: 32,
        }
    }
}

/// Where the negotiated sampling period is pushed
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DelaySink {
    #[default]
    ControlDevice,
    Vendor,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub library: PathBuf,
    pub delay_sink: DelaySink,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from("libakm.so"),
            delay_sink: DelaySink::ControlDevice,
        }
    }
}

/// Scale factors applied to raw axis values, x/y/z or azimuth/pitch/roll
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Calibration {
    pub accel: [f32; 3],
    pub magnetic: [f32; 3],
    pub orientation: [f32; 3],
}

impl Default for Calibration {
    fn default() -> Self {
        let accel = GRAVITY_EARTH / ACCEL_LSG;
        let magnetic = 1.0 / 16.0;
        let orientation = 1.0 / 64.0;
        Self {
            accel: [accel; 3],
            magnetic: [magnetic; 3],
            orientation: [orientation; 3],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    /// Z-axis change (m/s^2) between consecutive samples that counts as motion
    pub threshold: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { threshold: 1.0 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DelayConfig {
    /// Period assumed for every sensor until a caller asks for another
    pub initial_ns: i64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            initial_ns: 200_000_000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_events: usize,
    pub stats_interval_secs: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            max_events: 16,
            stats_interval_secs: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StartupConfig {
    pub sensors: Vec<LogicalSensorId>,
    pub delay_ns: i64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            sensors: vec![LogicalSensorId::Accelerometer],
            delay_ns: 66_000_000,
        }
    }
}

impl SensorConfig {
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub async fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: SensorConfig = toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize configuration: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        debug!("Configuration written to {}", path.display());
        Ok(())
    }

    /// Writes the default configuration if `path` does not exist yet
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        SensorConfig::default().save(path).await
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
