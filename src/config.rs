use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "configuration.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60 * 5;

/// Bridge configuration: identity of the bridge, the known sensors and the
/// staleness timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorConfiguration {
    pub name: String,
    pub serial_number: String,
    pub model: String,
    pub manufacturer: String,
    /// Seconds a sensor may stay silent before it is removed.
    pub timeout: u64,
    pub sensors: Vec<SensorEntry>,
    /// Pairing state owned by the protocol storage, kept as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_kit: Option<serde_json::Value>,
}

/// A known sensor. The id matches either the Bluetooth address or the
/// advertised name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
}

/// Offsets added to the decoded values of a sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
}

impl SensorEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            model: None,
            calibration: None,
        }
    }

    pub fn temperature_delta(&self) -> f32 {
        self.calibration.and_then(|c| c.temperature).unwrap_or(0.0)
    }

    pub fn humidity_delta(&self) -> f32 {
        self.calibration.and_then(|c| c.humidity).unwrap_or(0.0)
    }
}

impl Default for SensorConfiguration {
    fn default() -> Self {
        Self {
            name: "Sensor Bridge".to_string(),
            serial_number: "0000".to_string(),
            model: "Bridge".to_string(),
            manufacturer: "Miller Technology".to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            sensors: Vec::new(),
            home_kit: None,
        }
    }
}

impl SensorConfiguration {
    /// Read the configuration document at `path`. A zero timeout is rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.timeout == 0 {
            return Err(ConfigError::InvalidTimeout(config.timeout.to_string()));
        }
        Ok(config)
    }

    /// Read the configuration, falling back to an empty default when the
    /// document is missing or corrupt.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!(
                    "Loaded configuration with {} sensors, timeout {}s",
                    config.sensors.len(),
                    config.timeout
                );
                config
            }
            Err(e) => {
                warn!("{}. Using default configuration", e);
                Self::default()
            }
        }
    }

    /// Write the configuration atomically (temporary file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self).map_err(ConfigError::Serialize)?;
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(write_error)?;
        std::fs::rename(&tmp, path).map_err(write_error)
    }

    /// Path of the configuration document, from `SENSOR_CONFIG` or the default.
    pub fn path_from_env() -> PathBuf {
        env::var("SENSOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Apply `SENSOR_TAGS` and `SENSOR_TIMEOUT` from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(tags) = env::var("SENSOR_TAGS") {
            let added = self.merge_entries(parse_sensor_tags(&tags));
            info!("Added {} sensors from SENSOR_TAGS", added);
        }

        if let Ok(timeout) = env::var("SENSOR_TIMEOUT") {
            self.timeout = parse_timeout(&timeout)?;
        }

        Ok(())
    }

    /// Append entries whose ids are not configured yet, returning how many were added.
    pub fn merge_entries(&mut self, entries: Vec<SensorEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self.sensors.iter().any(|s| s.id == entry.id) {
                continue;
            }
            self.sensors.push(entry);
            added += 1;
        }
        added
    }

    /// First entry whose id equals any of the candidates.
    pub fn lookup(&self, candidates: &[&str]) -> Option<&SensorEntry> {
        self.sensors
            .iter()
            .find(|entry| candidates.iter().any(|c| entry.id == *c))
    }

    /// Only configured sensors are bridged when at least one entry exists.
    pub fn is_allow_list_active(&self) -> bool {
        !self.sensors.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::seconds(self.timeout.min(i64::MAX as u64) as i64)
    }
}

/// Parse `id=name` pairs separated by commas. Pairs without a name are
/// accepted as bare ids.
pub fn parse_sensor_tags(tags: &str) -> Vec<SensorEntry> {
    let mut entries = Vec::new();

    for pair in tags.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (id, name) = match pair.split_once('=') {
            Some((id, name)) => (id.trim(), Some(name.trim())),
            None => (pair, None),
        };
        if id.is_empty() {
            warn!("Ignoring sensor tag without id: '{}'", pair);
            continue;
        }
        let mut entry = SensorEntry::new(id);
        entry.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        entries.push(entry);
    }

    entries
}

fn parse_timeout(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidTimeout(value.to_string())),
    }
}
