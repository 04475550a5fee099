//! Server configuration.
//!
//! Every section has sensible defaults, so an empty (or missing) TOML file
//! yields a working simulator. Values can be adjusted with the `with_*`
//! builders or loaded from a file with [`Config::load`].
//!
//! # Example
//!
//! ```rust
//! use alpaca_rotator::config::{Config, DeviceConfig, NetworkConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.network.port, 5555);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_network(NetworkConfig::default().with_port(11111))
//!     .with_device(DeviceConfig::default().with_steps_per_sec(20));
//!
//! // Or parse TOML
//! let config = Config::from_toml_str("[device]\nstep_size = 0.5\n").unwrap();
//! assert_eq!(config.device.step_size, 0.5);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Well-known UDP port for Alpaca discovery.
pub const ALPACA_DISCOVERY_PORT: u16 = 32227;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or has mistyped values.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Values parsed but are not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network listener configuration
    pub network: NetworkConfig,
    /// Server metadata and error reporting
    pub server: ServerConfig,
    /// Simulated rotator constants
    pub device: DeviceConfig,
    /// Logging setup
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot drive the simulator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.device.step_size.is_finite() && self.device.step_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "device.step_size must be positive, got {}",
                self.device.step_size
            )));
        }
        if self.device.steps_per_sec == 0 {
            return Err(ConfigError::Invalid(
                "device.steps_per_sec must be at least 1".into(),
            ));
        }
        if self.logging.max_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "logging.max_size_mb must be at least 1".into(),
            ));
        }
        if self.logging.num_keep_logs == 0 {
            return Err(ConfigError::Invalid(
                "logging.num_keep_logs must be at least 1".into(),
            ));
        }
        if self.network.port == 0 {
            return Err(ConfigError::Invalid("network.port must not be 0".into()));
        }
        Ok(())
    }

    /// Set network configuration
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Set server configuration
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

// ============================================================================
// Network Config
// ============================================================================

/// HTTP and discovery listener configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP server binds to
    pub ip_address: IpAddr,
    /// HTTP port, also advertised through discovery
    pub port: u16,
    /// UDP port for discovery requests
    pub discovery_port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5555,
            discovery_port: ALPACA_DISCOVERY_PORT,
            cors_permissive: false,
        }
    }
}

impl NetworkConfig {
    /// Set the bind address
    pub fn with_ip_address(mut self, ip: IpAddr) -> Self {
        self.ip_address = ip;
        self
    }

    /// Set the HTTP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the discovery port
    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// HTTP listen address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_address, self.port)
    }

    /// Discovery listen address (always all interfaces, broadcasts must reach it)
    pub fn discovery_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.discovery_port)
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// Server-level metadata and error reporting
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Free-form location reported by the management description
    pub location: String,
    /// Include the underlying cause in driver error messages
    pub verbose_driver_exceptions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            location: "Anywhere on Earth".into(),
            verbose_driver_exceptions: true,
        }
    }
}

impl ServerConfig {
    /// Set the location string
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.into();
        self
    }

    /// Set driver error verbosity
    pub fn with_verbose_driver_exceptions(mut self, verbose: bool) -> Self {
        self.verbose_driver_exceptions = verbose;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Simulated rotator constants
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Informational only. `CanReverse` is always reported as `true`
    /// because IRotatorV3 and later require it.
    pub can_reverse: bool,
    /// Degrees per step
    pub step_size: f64,
    /// Stepping rate
    pub steps_per_sec: u32,
    /// Complete `Connected = true` / `Connect` immediately instead of after a delay
    pub sync_write_connected: bool,
    /// Delay before an asynchronous connect completes
    pub connect_delay_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            can_reverse: true,
            step_size: 1.0,
            steps_per_sec: 6,
            sync_write_connected: true,
            connect_delay_ms: 5000,
        }
    }
}

impl DeviceConfig {
    /// Set reverse capability
    pub fn with_can_reverse(mut self, can_reverse: bool) -> Self {
        self.can_reverse = can_reverse;
        self
    }

    /// Set the step size in degrees
    pub fn with_step_size(mut self, degrees: f64) -> Self {
        self.step_size = degrees;
        self
    }

    /// Set the stepping rate
    pub fn with_steps_per_sec(mut self, rate: u32) -> Self {
        self.steps_per_sec = rate;
        self
    }

    /// Set the connect policy
    pub fn with_sync_write_connected(mut self, sync: bool) -> Self {
        self.sync_write_connected = sync;
        self
    }

    /// Set the asynchronous connect delay
    pub fn with_connect_delay_ms(mut self, ms: u64) -> Self {
        self.connect_delay_ms = ms;
        self
    }

    /// Time between steps
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.steps_per_sec.max(1)))
    }

    /// Delay used for asynchronous connects
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }
}

// ============================================================================
// Logging Config
// ============================================================================

/// Logging setup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `alpaca_rotator=debug`
    pub log_level: String,
    /// Write log lines to stdout
    pub log_to_stdout: bool,
    /// Also write to this file. Empty disables the file sink.
    ///
    /// The previous file is rolled over to `<log_file>.1` at startup.
    pub log_file: String,
    /// Roll the log file over once it reaches this many megabytes
    pub max_size_mb: u64,
    /// Number of rolled-over log files to keep
    pub num_keep_logs: usize,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_to_stdout: true,
            log_file: String::new(),
            max_size_mb: 5,
            num_keep_logs: 10,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Set the filter directive
    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable stdout output
    pub fn with_log_to_stdout(mut self, enabled: bool) -> Self {
        self.log_to_stdout = enabled;
        self
    }

    /// Set the log file path
    pub fn with_log_file(mut self, path: &str) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set the rotation size in megabytes
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_size_mb = megabytes;
        self
    }

    /// Set how many rolled-over files to keep
    pub fn with_num_keep_logs(mut self, count: usize) -> Self {
        self.num_keep_logs = count;
        self
    }

    /// Byte size at which the log file rolls over
    pub fn max_size_bytes(&self) -> usize {
        usize::try_from(self.max_size_mb.saturating_mul(1_000_000)).unwrap_or(usize::MAX)
    }

    /// Enable JSON output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
