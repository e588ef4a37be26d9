use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::strip::apa102::MAX_BRIGHTNESS;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/respeaker-led.ron";
pub const DEFAULT_PIPE_PATH: &str = "/run/shm/respeaker-led.sock";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where the command fifo is created
    pub pipe_path: PathBuf,
    /// Permission bits of the command fifo
    pub pipe_mode: u32,
    pub strip: StripConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StripConfig {
    pub spi_bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
    /// BCM number of the pin that enables the strip's supply
    pub power_pin: u8,
    /// APA102 global brightness, 0 to 31
    pub brightness: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipe_path: PathBuf::from(DEFAULT_PIPE_PATH),
            pipe_mode: 0o660,
            strip: StripConfig::default(),
        }
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            slave_select: 1,
            clock_hz: 8_000_000,
            power_pin: 5,
            brightness: MAX_BRIGHTNESS,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, Error> {
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = ron::from_str(&config)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if one was given, otherwise the system config if it
    /// exists, otherwise the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Config, Error> {
        match path {
            Some(path) => Config::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Config::load(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");

        // Write an example config file
        std::fs::write(
            &path,
            r#"(
    pipe_path: "/tmp/leds.sock",
    strip: (
        power_pin: 6,
        brightness: 10,
    ),
)"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config,
            Config {
                pipe_path: PathBuf::from("/tmp/leds.sock"),
                pipe_mode: 0o660,
                strip: StripConfig {
                    power_pin: 6,
                    brightness: 10,
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.ron")).is_err());
    }

    #[test]
    fn test_discover_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(pipe_mode: 384)").unwrap();

        let config = Config::discover(Some(&path)).unwrap();
        assert_eq!(config.pipe_mode, 0o600);
        assert_eq!(config.pipe_path, PathBuf::from(DEFAULT_PIPE_PATH));
    }
}
