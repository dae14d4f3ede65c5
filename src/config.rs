//! Driver configuration: serial port settings and login credentials, loaded
//! from a TOML file with sane defaults when one isn't present.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::SerialSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SerialConfig {
    pub port_name: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl From<&SerialConfig> for SerialSettings {
    fn from(cfg: &SerialConfig) -> Self {
        SerialSettings {
            port_name: cfg.port_name.clone(),
            baud_rate: cfg.baud_rate,
            read_timeout: Duration::from_millis(cfg.timeout_ms),
            write_timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct MeterConfig {
    pub serial: u32,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_username() -> String {
    "EDMA".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub serial: SerialConfig,
    pub meter: MeterConfig,
}

impl Config {
    /// Loads config from a TOML file. Missing optional fields fall back to
    /// their defaults via serde.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let text = r#"
            [serial]
            port-name = "/dev/ttyUSB0"

            [meter]
            serial = 251308613
            password = "IMDEIMDE"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.serial.port_name, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.meter.serial, 251308613);
        assert_eq!(config.meter.username, "EDMA");
    }
}
