use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::time::Duration;

use crate::storage::RotationPolicy;

const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_UDP_TARGET: &str = "192.168.1.28:4210";
const DEFAULT_CSV_MAX_BYTES: u64 = 45 * 1024 * 1024 * 1024; // 45 GiB
const DEFAULT_CSV_EVICT_LINES: usize = 604_800;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub serial_timeout: Duration,
    pub device_address: u8,
    pub simulate_sensor: bool,
    pub read_interval: Duration,
    pub initial_settle: Duration,
    pub format_switch_settle: Duration,
    pub alternate_formats: bool,
    pub max_cycles: Option<u64>,
    pub window_capacity: usize,
    pub validate_ph_range: bool,
    pub udp_target: SocketAddr,
    pub report_interval: Duration,
    pub announce_message: Option<String>,
    pub announce_delay: Duration,
    pub announce_interval: Duration,
    pub csv_path: PathBuf,
    pub csv_header: bool,
    pub rotation: RotationPolicy,
}

impl SensorConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a key lookup, defaulting unset keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let max_cycles: u64 = parse_value("MAX_CYCLES", &get("MAX_CYCLES", "10000"))?;
        let csv_max_bytes: u64 = parse_value(
            "CSV_MAX_BYTES",
            &get("CSV_MAX_BYTES", &DEFAULT_CSV_MAX_BYTES.to_string()),
        )?;
        let csv_evict_lines: usize = parse_value(
            "CSV_EVICT_LINES",
            &get("CSV_EVICT_LINES", &DEFAULT_CSV_EVICT_LINES.to_string()),
        )?;
        let rotation = if csv_max_bytes == 0 {
            RotationPolicy::Unbounded
        } else {
            RotationPolicy::SizeBounded {
                max_bytes: csv_max_bytes,
                evict_lines: csv_evict_lines,
            }
        };

        let window_capacity: usize =
            parse_value("WINDOW_CAPACITY", &get("WINDOW_CAPACITY", "60"))?;
        if window_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "WINDOW_CAPACITY",
                value: "0".into(),
            });
        }

        Ok(SensorConfig {
            serial_port: get("SERIAL_PORT", DEFAULT_SERIAL_PORT),
            baud_rate: parse_value("SERIAL_BAUD_RATE", &get("SERIAL_BAUD_RATE", "9600"))?,
            serial_timeout: millis("SERIAL_TIMEOUT_MS", &get("SERIAL_TIMEOUT_MS", "1000"))?,
            device_address: parse_value("DEVICE_ADDRESS", &get("DEVICE_ADDRESS", "1"))?,
            simulate_sensor: flag("SIMULATE_SENSOR", &get("SIMULATE_SENSOR", "false"))?,
            read_interval: millis("READ_INTERVAL_MS", &get("READ_INTERVAL_MS", "2000"))?,
            initial_settle: millis("INITIAL_SETTLE_MS", &get("INITIAL_SETTLE_MS", "2000"))?,
            format_switch_settle: millis(
                "FORMAT_SWITCH_SETTLE_MS",
                &get("FORMAT_SWITCH_SETTLE_MS", "800"),
            )?,
            alternate_formats: flag("ALTERNATE_FORMATS", &get("ALTERNATE_FORMATS", "true"))?,
            max_cycles: (max_cycles > 0).then_some(max_cycles),
            window_capacity,
            validate_ph_range: flag("VALIDATE_PH_RANGE", &get("VALIDATE_PH_RANGE", "true"))?,
            udp_target: parse_value("UDP_TARGET", &get("UDP_TARGET", DEFAULT_UDP_TARGET))?,
            report_interval: seconds(
                "REPORT_INTERVAL_SECS",
                &get("REPORT_INTERVAL_SECS", "60"),
            )?,
            announce_message: lookup("ANNOUNCE_MESSAGE").filter(|m| !m.trim().is_empty()),
            announce_delay: seconds("ANNOUNCE_DELAY_SECS", &get("ANNOUNCE_DELAY_SECS", "30"))?,
            announce_interval: seconds(
                "ANNOUNCE_INTERVAL_SECS",
                &get("ANNOUNCE_INTERVAL_SECS", "60"),
            )?,
            csv_path: PathBuf::from(get("CSV_PATH", "data.csv")),
            csv_header: flag("CSV_HEADER", &get("CSV_HEADER", "false"))?,
            rotation,
        })
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_value(key, value).map(Duration::from_millis)
}

fn seconds(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_value(key, value).map(Duration::from_secs)
}

fn flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<SensorConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SensorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_field_installation() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.serial_timeout, Duration::from_millis(1000));
        assert_eq!(config.device_address, 1);
        assert!(!config.simulate_sensor);
        assert_eq!(config.read_interval, Duration::from_millis(2000));
        assert_eq!(config.initial_settle, Duration::from_millis(2000));
        assert_eq!(config.format_switch_settle, Duration::from_millis(800));
        assert!(config.alternate_formats);
        assert_eq!(config.max_cycles, Some(10000));
        assert_eq!(config.window_capacity, 60);
        assert!(config.validate_ph_range);
        assert_eq!(config.udp_target, "192.168.1.28:4210".parse::<SocketAddr>().unwrap());
        assert_eq!(config.report_interval, Duration::from_secs(60));
        assert_eq!(config.announce_message, None);
        assert_eq!(config.csv_path, PathBuf::from("data.csv"));
        assert!(!config.csv_header);
        assert_eq!(
            config.rotation,
            RotationPolicy::SizeBounded {
                max_bytes: 45 * 1024 * 1024 * 1024,
                evict_lines: 604_800
            }
        );
    }

    #[test]
    fn zero_values_select_unbounded_modes() {
        let config = config_from(&[("MAX_CYCLES", "0"), ("CSV_MAX_BYTES", "0")]).unwrap();
        assert_eq!(config.max_cycles, None);
        assert_eq!(config.rotation, RotationPolicy::Unbounded);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("SIMULATE_SENSOR", "yes"),
            ("DEVICE_ADDRESS", "17"),
            ("ALTERNATE_FORMATS", "off"),
            ("UDP_TARGET", "127.0.0.1:9000"),
            ("ANNOUNCE_MESSAGE", "Treatment plant A"),
        ])
        .unwrap();

        assert!(config.simulate_sensor);
        assert_eq!(config.device_address, 17);
        assert!(!config.alternate_formats);
        assert_eq!(config.udp_target, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.announce_message.as_deref(), Some("Treatment plant A"));
    }

    #[test]
    fn rejects_invalid_values() {
        for (key, value) in [
            ("DEVICE_ADDRESS", "300"),
            ("UDP_TARGET", "display"),
            ("VALIDATE_PH_RANGE", "maybe"),
            ("WINDOW_CAPACITY", "0"),
        ] {
            match config_from(&[(key, value)]) {
                Err(ConfigError::Invalid { key: bad, .. }) => assert_eq!(bad, key),
                Ok(_) => panic!("{}={} was accepted", key, value),
            }
        }
    }
}
