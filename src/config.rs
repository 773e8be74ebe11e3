//! YAML configuration
//!
//! Besides server and sweeper settings, the config carries hospital seed
//! data. Hospital CRUD itself belongs to an external admin workflow; the
//! seed section stands in for it so the core can run on its own.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::inventory::RoomType;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub hospitals: Vec<HospitalSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Seconds between sweeps. Anything well under the TTL works.
    pub interval_secs: u64,
    /// Minutes an unconfirmed hold stays alive. The product copy promises
    /// 15, so treat this as a knob, not a constant.
    pub hold_ttl_mins: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            interval_secs: 30,
            hold_ttl_mins: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HospitalSeed {
    pub id: String,
    pub name: String,
    pub rooms: Vec<RoomSeed>,
}

#[derive(Debug, Deserialize)]
pub struct RoomSeed {
    pub room_type: RoomType,
    pub price: u32,
    pub beds: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "Failed to read config: {}", err),
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err)
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&text)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
api:
  host: 127.0.0.1
  port: 3000
sweeper:
  interval_secs: 45
  hold_ttl_mins: 15
hospitals:
  - id: h1
    name: City Hospital
    rooms:
      - room_type: icu
        price: 5000
        beds: [icu-1, icu-2]
      - room_type: general
        price: 1500
        beds: [gen-1, gen-2, gen-3]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.sweeper.interval_secs, 45);
        assert_eq!(config.hospitals.len(), 1);
        assert_eq!(config.hospitals[0].rooms[0].room_type, RoomType::Icu);
        assert_eq!(config.hospitals[0].rooms[1].beds.len(), 3);
    }

    #[test]
    fn sweeper_section_is_optional_with_defaults() {
        let yaml = "api:\n  host: 0.0.0.0\n  port: 8080\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sweeper.interval_secs, 30);
        assert_eq!(config.sweeper.hold_ttl_mins, 15);
        assert!(config.hospitals.is_empty());
    }
}
