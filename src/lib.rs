//! # alpaca-rotator
//!
//! An ASCOM Alpaca device server exposing one simulated camera rotator over
//! HTTP, with UDP discovery.
//!
//! ## Features
//!
//! - **Rotator simulation**: Stepped shortest-path motion, sync offsets, halt
//! - **Alpaca protocol**: Request validation, transaction numbering, JSON envelopes
//! - **Error taxonomy**: Protocol error numbers carried inside HTTP 200 replies
//! - **Discovery**: Answers `alpacadiscovery1` broadcasts with the HTTP port
//!
//! ## Architecture
//!
//! - `rotator` - Motion state machine for the simulated device
//! - `transaction` - Server transaction ID sequencer
//! - `error` - Alpaca error numbers and messages
//! - `config` - TOML configuration with builder-style defaults
//! - `telemetry` - `tracing` subscriber setup
//! - `services` - HTTP API, validation, envelopes, discovery (`web` feature)
//!
//! ## Example
//!
//! ```rust
//! use alpaca_rotator::{DeviceConfig, RotatorDevice};
//!
//! let mut rotator = RotatorDevice::new(DeviceConfig::default());
//! rotator.connect();
//! rotator.move_absolute(3.0).unwrap();
//!
//! // Drive the motion one step at a time
//! while rotator.step() {}
//! assert!((rotator.position() - 3.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]

/// Configuration loading and defaults.
pub mod config;
/// Alpaca protocol errors.
pub mod error;
/// Simulated rotator motion state machine.
pub mod rotator;
/// Logging initialisation.
pub mod telemetry;
/// Server transaction numbering.
pub mod transaction;

/// Network services for the HTTP API and discovery (feature-gated).
#[cfg(feature = "web")]
pub mod services;

// Re-exports for convenience
pub use config::{
    Config, ConfigError, DeviceConfig, LoggingConfig, NetworkConfig, ServerConfig,
    ALPACA_DISCOVERY_PORT,
};
pub use error::{AlpacaError, ProtocolError};
pub use rotator::{wrap180, wrap360, ConnectionState, RotatorDevice, RotatorError};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transaction::TransactionSequencer;
