//! Gateway configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`GatewayConfig::default()`)
//! 2. `config/gateway.toml` (optional)
//! 3. Environment variables prefixed with `GATEWAY_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use telemetry_gateway::config::GatewayConfig;
//!
//! let config = GatewayConfig::load()?;
//! println!("Collector: {}:{}", config.delivery.host, config.delivery.port);
//! # Ok::<(), telemetry_gateway::error::GatewayError>(())
//! ```
//!
//! Environment override example: `GATEWAY_DELIVERY__HOST=10.0.0.7`

use crate::error::{AppResult, GatewayError};
use crate::timestamp::TIMESTAMP_FIELD_RESERVE;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serial byte source settings
    pub serial: SerialConfig,
    /// JSON framer settings
    pub framer: FramerConfig,
    /// Collector delivery settings
    pub delivery: DeliveryConfig,
    /// Local persistence settings
    pub storage: StorageConfig,
    /// Scheduler pacing
    pub scheduler: SchedulerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Telemetry Gateway".to_string(),
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
        }
    }
}

/// Serial line configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial port path (e.g. "/dev/ttyACM0")
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Largest chunk read per poll, also the raw ring buffer slot size
    pub chunk_size: usize,
    /// Number of raw chunks buffered between the serial and framer tasks
    pub buffer_capacity: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            chunk_size: 1024,
            buffer_capacity: 32,
        }
    }
}

/// JSON framer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Nesting depth an object must reach to be accepted
    pub expected_depth: u32,
    /// Largest accepted object, in bytes, before the timestamp is added
    pub max_object_len: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            expected_depth: 2,
            max_object_len: 448,
        }
    }
}

/// Collector delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Collector host name or IPv4 address, also sent as the Host header
    pub host: String,
    /// Collector TCP port
    pub port: u16,
    /// Request path
    pub path: String,
    /// Largest stamped record, also the delivery and storage slot size
    pub record_size: usize,
    /// Number of records buffered for delivery
    pub buffer_capacity: usize,
    /// Response buffer size in bytes; filling it is fatal
    pub response_capacity: usize,
    /// Longest time the state machine may sit in one state
    #[serde(with = "humantime_serde")]
    pub max_state_time: Duration,
    /// Cool-down after every connection close
    #[serde(with = "humantime_serde")]
    pub retry_time: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            host: "10.0.0.51".to_string(),
            port: 5760,
            path: "/api/v1.0/measurement/".to_string(),
            record_size: 512,
            buffer_capacity: 4096,
            response_capacity: 4096,
            max_state_time: Duration::from_secs(15),
            retry_time: Duration::from_secs(3),
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Copy framed records to the local file
    pub enabled: bool,
    /// Output file, one JSON object per line
    pub path: PathBuf,
    /// Number of records buffered for persistence
    pub buffer_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("measurement/data.json"),
            buffer_capacity: 10,
        }
    }
}

/// Scheduler pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep after a cycle in which some task was busy
    #[serde(with = "humantime_serde")]
    pub short_sleep: Duration,
    /// Sleep after a cycle in which every task was idle
    #[serde(with = "humantime_serde")]
    pub long_sleep: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            short_sleep: Duration::from_millis(10),
            long_sleep: Duration::from_secs(1),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `config/gateway.toml` and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path).extract().map_err(GatewayError::from)
    }

    /// The provider stack used by [`GatewayConfig::load_from`]
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(GatewayConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GATEWAY_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.serial.port.is_empty() {
            return Err("serial.port must not be empty".to_string());
        }

        let sizes = [
            ("serial.chunk_size", self.serial.chunk_size),
            ("serial.buffer_capacity", self.serial.buffer_capacity),
            ("framer.max_object_len", self.framer.max_object_len),
            ("delivery.record_size", self.delivery.record_size),
            ("delivery.buffer_capacity", self.delivery.buffer_capacity),
            ("delivery.response_capacity", self.delivery.response_capacity),
            ("storage.buffer_capacity", self.storage.buffer_capacity),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }

        if self.framer.expected_depth == 0 {
            return Err("framer.expected_depth must be at least 1".to_string());
        }

        let stamped = self.framer.max_object_len + TIMESTAMP_FIELD_RESERVE;
        if stamped > self.delivery.record_size {
            return Err(format!(
                "delivery.record_size {} cannot hold a stamped object of up to {} bytes \
                 (framer.max_object_len {} + {} reserved for the timestamp)",
                self.delivery.record_size,
                stamped,
                self.framer.max_object_len,
                TIMESTAMP_FIELD_RESERVE
            ));
        }

        if self.delivery.host.is_empty() {
            return Err("delivery.host must not be empty".to_string());
        }
        if !self.delivery.path.starts_with('/') {
            return Err(format!(
                "delivery.path '{}' must start with '/'",
                self.delivery.path
            ));
        }

        if self.scheduler.short_sleep > self.scheduler.long_sleep {
            return Err(format!(
                "scheduler.short_sleep ({:?}) must not exceed scheduler.long_sleep ({:?})",
                self.scheduler.short_sleep, self.scheduler.long_sleep
            ));
        }

        Ok(())
    }
}
