use crate::cost::{CostError, PriceTable, DEFAULT_GAS_M3, DEFAULT_KWH_HIGH, DEFAULT_KWH_LOW};
use crate::obis_utils::MeterProfile;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that points to an explicit config file
pub const CONFIG_ENV: &str = "P1M_CONFIG";
const CONFIG_PATHS: [&str; 2] = ["config/p1meter.yaml", "p1meter.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Price(#[from] CostError),
}

fn device_port_default() -> String { return "/dev/ttyUSB0".to_string() }
fn device_read_timeout_default() -> u64 { return 20 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    #[serde(default="device_port_default")]
    pub port: String,
    /// Seconds a single read may block
    #[serde(default="device_read_timeout_default")]
    pub read_timeout: u64,
}

fn replay_step_default() -> i64 { return 10 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ReplayConfig {
    /// Recorded telegram file to read instead of the serial device
    pub path: Option<String>,
    /// Seconds between two replayed telegrams
    #[serde(default="replay_step_default")]
    pub step: i64,
}

fn meter_profile_default() -> MeterProfile { return MeterProfile::Dsmr22 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterConfig {
    #[serde(default="meter_profile_default")]
    pub profile: MeterProfile,
}

fn prices_kwh_low_default() -> f64 { return DEFAULT_KWH_LOW }
fn prices_kwh_high_default() -> f64 { return DEFAULT_KWH_HIGH }
fn prices_gas_default() -> f64 { return DEFAULT_GAS_M3 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PricesConfig {
    #[serde(default="prices_kwh_low_default")]
    pub kwh_low: f64,
    #[serde(default="prices_kwh_high_default")]
    pub kwh_high: f64,
    #[serde(default="prices_gas_default")]
    pub gas: f64,
}

impl PricesConfig {
    pub fn price_table(&self) -> Result<PriceTable, CostError> {
        PriceTable::new(self.kwh_low, self.kwh_high, self.gas)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Average over `interval` seconds and flush one record
    Aggregate,
    /// Push every telegram's values straight to the sink
    Live,
}

fn output_mode_default() -> OutputMode { return OutputMode::Aggregate }
fn output_interval_default() -> u64 { return 300 }
fn output_sink_timeout_default() -> u64 { return 10 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct OutputConfig {
    #[serde(default="output_mode_default")]
    pub mode: OutputMode,
    #[serde(default="output_interval_default")]
    pub interval: u64,
    #[serde(default="output_sink_timeout_default")]
    pub sink_timeout: u64,
}

fn file_sink_path_default() -> String { return "energyavg.dat".to_string() }

fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_client_name_default() -> String { return "p1meter".to_string() }
fn mqtt_base_topic_default() -> String { return "p1meter".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_base_topic_default")]
    pub base_topic: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    File {
        #[serde(default="file_sink_path_default")]
        path: String,
    },
    Mqtt(MqttConfig),
}

fn restart_max_attempts_default() -> u32 { return 0 }
fn restart_backoff_default() -> u64 { return 30 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RestartConfig {
    /// How often the reader is restarted after a read failure
    #[serde(default="restart_max_attempts_default")]
    pub max_attempts: u32,
    /// Seconds to wait before a restart
    #[serde(default="restart_backoff_default")]
    pub backoff: u64,
}

fn device_default() -> DeviceConfig { return DeviceConfig { port: device_port_default(), read_timeout: device_read_timeout_default() } }
fn replay_default() -> ReplayConfig { return ReplayConfig { path: None, step: replay_step_default() } }
fn meter_default() -> MeterConfig { return MeterConfig { profile: meter_profile_default() } }
fn prices_default() -> PricesConfig { return PricesConfig { kwh_low: DEFAULT_KWH_LOW, kwh_high: DEFAULT_KWH_HIGH, gas: DEFAULT_GAS_M3 } }
fn output_default() -> OutputConfig { return OutputConfig { mode: output_mode_default(), interval: output_interval_default(), sink_timeout: output_sink_timeout_default() } }
fn sink_default() -> SinkConfig { return SinkConfig::File { path: file_sink_path_default() } }
fn restart_default() -> RestartConfig { return RestartConfig { max_attempts: restart_max_attempts_default(), backoff: restart_backoff_default() } }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default="device_default")]
    pub device: DeviceConfig,
    #[serde(default="replay_default")]
    pub replay: ReplayConfig,
    #[serde(default="meter_default")]
    pub meter: MeterConfig,
    #[serde(default="prices_default")]
    pub prices: PricesConfig,
    #[serde(default="output_default")]
    pub output: OutputConfig,
    #[serde(default="sink_default")]
    pub sink: SinkConfig,
    #[serde(default="restart_default")]
    pub restart: RestartConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: device_default(),
            replay: replay_default(),
            meter: meter_default(),
            prices: prices_default(),
            output: output_default(),
            sink: sink_default(),
            restart: restart_default(),
        }
    }
}

impl Config {
    /// Load from `$P1M_CONFIG`, `config/p1meter.yaml` or `p1meter.yaml`, in
    /// that order. Without any file the defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Config::from_file(&path);
        }

        for path in CONFIG_PATHS.iter() {
            if Path::new(path).exists() {
                return Config::from_file(path);
            }
        }

        info!("No config file found, using defaults");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        info!("Reading config from {}", path.display());
        Config::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        /* An empty document is valid and means all defaults */
        let c: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yml::from_str(contents)?
        };
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.prices.price_table()?;

        if self.output.interval == 0 {
            return Err(ConfigError::Invalid("output.interval must be greater than 0".to_string()));
        }
        if self.output.sink_timeout == 0 {
            return Err(ConfigError::Invalid("output.sink_timeout must be greater than 0".to_string()));
        }
        if self.device.read_timeout == 0 {
            return Err(ConfigError::Invalid("device.read_timeout must be greater than 0".to_string()));
        }
        if self.replay.step <= 0 {
            return Err(ConfigError::Invalid("replay.step must be greater than 0".to_string()));
        }
        if self.output.mode == OutputMode::Live {
            if let SinkConfig::File { .. } = self.sink {
                return Err(ConfigError::Invalid("live mode needs a time-series sink, not a file".to_string()));
            }
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.device.read_timeout)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.output.sink_timeout)
    }
}
