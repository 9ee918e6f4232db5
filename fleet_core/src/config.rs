//! Configuration file support for the drone fleet.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/drones/config.toml`.

use crate::machine::TransitionTable;
use crate::{Error, Result, FULL_BATTERY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub fleet: FleetConfig,

    #[serde(default)]
    pub transitions: TransitionTable,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Battery policy and tick cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Minimum battery a drone needs to accept a load
    #[serde(default = "default_capacity_threshold")]
    pub capacity_threshold: u8,

    /// Battery gained while idle, or lost while active, per tick
    #[serde(default = "default_capacity_delta")]
    pub capacity_delta_per_time_unit: u8,

    #[serde(default = "default_periodic_unit_millis")]
    pub periodic_unit_millis: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            capacity_threshold: default_capacity_threshold(),
            capacity_delta_per_time_unit: default_capacity_delta(),
            periodic_unit_millis: default_periodic_unit_millis(),
        }
    }
}

impl FleetConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_unit_millis)
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("drones")
}

fn default_capacity_threshold() -> u8 {
    25
}

fn default_capacity_delta() -> u8 {
    2
}

fn default_periodic_unit_millis() -> u64 {
    5000
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    ///
    /// The transition table validates itself during deserialization.
    pub fn validate(&self) -> Result<()> {
        let fleet = &self.fleet;
        if fleet.capacity_threshold > FULL_BATTERY {
            return Err(Error::Config(format!(
                "capacity_threshold must be in 0..=100, got {}",
                fleet.capacity_threshold
            )));
        }
        if fleet.capacity_delta_per_time_unit == 0
            || fleet.capacity_delta_per_time_unit > FULL_BATTERY
        {
            return Err(Error::Config(format!(
                "capacity_delta_per_time_unit must be in 1..=100, got {}",
                fleet.capacity_delta_per_time_unit
            )));
        }
        if fleet.periodic_unit_millis == 0 {
            return Err(Error::Config("periodic_unit_millis must be positive".into()));
        }

        let drain = self.transitions.cycle_len() * usize::from(fleet.capacity_delta_per_time_unit);
        if drain > usize::from(fleet.capacity_threshold) {
            tracing::warn!(
                "A full delivery cycle drains {}% but loads are accepted from {}%; batteries may hit zero",
                drain,
                fleet.capacity_threshold
            );
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("drones").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
