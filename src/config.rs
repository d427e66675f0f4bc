//! # Print Queue Host Configuration
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [printer]
//! printer_name = "bench-x1"
//!
//! [orchestrator]
//! request_buffer = 16
//! auto_start = true
//!
//! [verbosity]
//! queue = true
//! status = true
//!
//! [simulator]
//! prepare_ms = 200
//! print_ms = 1000
//!
//! [[jobs]]
//! file = "cap_auto_v08.gcode.3mf"
//! count = 2
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::announce::Subscriptions;
use crate::device::DeviceStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the queue host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default = "default_verbosity")]
    pub verbosity: Subscriptions,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Entries added to the queue at startup, in order.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            verbosity: default_verbosity(),
            simulator: SimulatorConfig::default(),
            jobs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrinterConfig {
    #[serde(default)]
    pub printer_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_request_buffer")]
    pub request_buffer: usize,
    #[serde(default = "default_announcement_buffer")]
    pub announcement_buffer: usize,
    #[serde(default)]
    pub auto_start: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_buffer: default_request_buffer(),
            announcement_buffer: default_announcement_buffer(),
            auto_start: false,
        }
    }
}

/// Timing and fault injection for the simulated printer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_prepare_ms")]
    pub prepare_ms: u64,
    #[serde(default = "default_print_ms")]
    pub print_ms: u64,
    #[serde(default)]
    pub initial_status: DeviceStatus,
    /// Probability that a simulated job ends `Failed`.
    #[serde(default)]
    pub failure_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            prepare_ms: default_prepare_ms(),
            print_ms: default_print_ms(),
            initial_status: DeviceStatus::Idle,
            failure_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobConfig {
    pub file: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.request_buffer == 0 {
            return Err(ConfigError::Invalid("orchestrator.request_buffer must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.simulator.failure_rate) {
            return Err(ConfigError::Invalid("simulator.failure_rate must be between 0 and 1".to_string()));
        }
        for (index, job) in self.jobs.iter().enumerate() {
            if job.file.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("jobs[{}] has an empty file name", index)));
            }
            if job.count == 0 {
                return Err(ConfigError::Invalid(format!("jobs[{}] ({}) must have count >= 1", index, job.file)));
            }
        }
        Ok(())
    }
}

// Default value functions
fn default_request_buffer() -> usize { 16 }
fn default_announcement_buffer() -> usize { 64 }
fn default_prepare_ms() -> u64 { 200 }
fn default_print_ms() -> u64 { 1000 }
fn default_count() -> u32 { 1 }
fn default_verbosity() -> Subscriptions {
    Subscriptions { printer: false, queue: true, status: true }
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path.display(), e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}
