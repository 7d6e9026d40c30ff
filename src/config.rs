//! Bridge configuration, loadable from TOML with per-field defaults.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::board::Stone;

/// Configuration for one bridge session.
///
/// Every field has a default matching the original deployment, so an empty
/// TOML file (or none at all) yields a usable configuration once a serial
/// port is supplied.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Board dimension N (the board is N×N).
    #[serde(default = "default_board_size")]
    board_size: usize,

    /// The color the local side plays. Black moves first.
    #[serde(default = "default_color")]
    color: Stone,

    /// Serial port name (e.g. `/dev/ttyUSB0` or `COM3`).
    #[serde(default)]
    port: String,

    /// Serial baud rate. The link is always 8 data bits, no parity, 1 stop bit.
    #[serde(default = "default_baud")]
    baud: u32,

    /// Quiet duration in seconds: how long the sensor file must stay
    /// unchanged before a settlement is considered.
    #[serde(default = "default_quiet_secs")]
    quiet_secs: f64,

    /// Sensor-file poll cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,

    /// Stall window in seconds: a settlement wait aborts after this long
    /// without any sensor-file change.
    #[serde(default = "default_stall_timeout_secs")]
    stall_timeout_secs: u64,

    /// Per-read serial timeout in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    read_timeout_ms: u64,

    /// Engine invocation as an argv vector.
    #[serde(default = "default_engine_command")]
    engine_command: Vec<String>,

    /// Optional working directory for the engine process.
    #[serde(default)]
    engine_dir: Option<String>,

    /// Engine execution timeout in seconds.
    #[serde(default = "default_engine_timeout_secs")]
    engine_timeout_secs: u64,

    /// Path of the sensor file written by the board-sensing system.
    #[serde(default = "default_sensor_file")]
    sensor_file: String,

    /// Path of the move-history file read by the engine.
    #[serde(default = "default_history_file")]
    history_file: String,

    /// Path of the engine's output file.
    #[serde(default = "default_engine_output_file")]
    engine_output_file: String,
}

fn default_board_size() -> usize {
    9
}

fn default_color() -> Stone {
    Stone::Black
}

fn default_baud() -> u32 {
    115_200
}

fn default_quiet_secs() -> f64 {
    2.0
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_stall_timeout_secs() -> u64 {
    300
}

fn default_read_timeout_ms() -> u64 {
    1_000
}

fn default_engine_command() -> Vec<String> {
    vec!["Connect6.exe".to_string()]
}

fn default_engine_timeout_secs() -> u64 {
    60
}

fn default_sensor_file() -> String {
    "Input.txt".to_string()
}

fn default_history_file() -> String {
    "Con6Input.txt".to_string()
}

fn default_engine_output_file() -> String {
    "Con6Output.txt".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            board_size: default_board_size(),
            color: default_color(),
            port: String::new(),
            baud: default_baud(),
            quiet_secs: default_quiet_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            stall_timeout_secs: default_stall_timeout_secs(),
            read_timeout_ms: default_read_timeout_ms(),
            engine_command: default_engine_command(),
            engine_dir: None,
            engine_timeout_secs: default_engine_timeout_secs(),
            sensor_file: default_sensor_file(),
            history_file: default_history_file(),
            engine_output_file: default_engine_output_file(),
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = %config.port, color = %config.color, "Config loaded successfully");
        Ok(config)
    }

    /// Validates the configuration before a session starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty port name, a non-positive quiet
    /// duration or poll interval, a zero baud rate, a board smaller than
    /// 2×2, or an empty engine command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size < 2 {
            return Err(ConfigError::new(format!(
                "Board size must be at least 2, got {}",
                self.board_size
            )));
        }
        if self.port.trim().is_empty() {
            return Err(ConfigError::new("Serial port must be specified".to_string()));
        }
        if self.baud == 0 {
            return Err(ConfigError::new("Baud rate must be positive".to_string()));
        }
        if !self.quiet_secs.is_finite() || self.quiet_secs <= 0.0 {
            return Err(ConfigError::new(format!(
                "Quiet duration must be a positive number of seconds, got {}",
                self.quiet_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::new("Poll interval must be positive".to_string()));
        }
        if self.engine_command.first().is_none_or(|c| c.trim().is_empty()) {
            return Err(ConfigError::new("Engine command must not be empty".to_string()));
        }
        Ok(())
    }

    /// The quiet duration as a [`Duration`].
    pub fn quiet_duration(&self) -> Duration {
        Duration::from_secs_f64(self.quiet_secs)
    }

    /// The poll cadence as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The stall window as a [`Duration`].
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    /// The per-read serial timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// The engine execution timeout as a [`Duration`].
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Overrides the local color.
    pub fn set_color(&mut self, color: Stone) {
        self.color = color;
    }

    /// Overrides the serial port name.
    pub fn set_port(&mut self, port: String) {
        self.port = port;
    }

    /// Overrides the baud rate.
    pub fn set_baud(&mut self, baud: u32) {
        self.baud = baud;
    }

    /// Overrides the quiet duration.
    pub fn set_quiet_secs(&mut self, quiet_secs: f64) {
        self.quiet_secs = quiet_secs;
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
