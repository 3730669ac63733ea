//! Configuration management for wake-warden.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::server::WardenSettings;
use crate::supervisor::LivenessPolicy;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transport configuration.
    pub transport: TransportSection,
    /// Failure-detection timing.
    pub liveness: LivenessSection,
    /// Phase-machine timing.
    pub lifecycle: LifecycleSection,
    /// Lifecycle handoff configuration.
    pub bridge: BridgeSection,
    /// Diagnostic output configuration.
    pub diagnostics: DiagnosticsSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Transport configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 46317,
        }
    }
}

/// Failure-detection timing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSection {
    /// Silence beyond this opens a client's grace window.
    pub heartbeat_timeout_secs: u64,
    /// Extra time a silent client is kept before removal.
    pub grace_window_secs: u64,
    /// Interval between supervisor scans; must stay below the timeout.
    pub scan_interval_secs: u64,
}

impl Default for LivenessSection {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 15,
            grace_window_secs: 300,
            scan_interval_secs: 5,
        }
    }
}

/// Phase-machine timing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSection {
    /// How long the dormant phase waits for a trigger before standing down.
    pub dormant_budget_secs: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            dormant_budget_secs: 180,
        }
    }
}

/// Lifecycle handoff section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Script run with `1` on activate and `2` on stand-down.
    /// No script means lifecycle signals are only logged.
    pub script: Option<PathBuf>,
}

/// Diagnostic output section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSection {
    /// File receiving one timestamped line per shutdown.
    pub shutdown_log: Option<PathBuf>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("WAKE_WARDEN_HOST") {
            self.transport.host = host;
        }

        if let Ok(port) = std::env::var("WAKE_WARDEN_PORT") {
            if let Ok(port) = port.parse() {
                self.transport.port = port;
            }
        }

        if let Ok(script) = std::env::var("WAKE_WARDEN_BRIDGE") {
            if !script.is_empty() {
                self.bridge.script = Some(PathBuf::from(script));
            }
        }

        if let Ok(level) = std::env::var("WAKE_WARDEN_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.transport.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.transport.port = port;
        }

        if let Some(ref script) = args.bridge {
            self.bridge.script = Some(script.clone());
        }

        if let Some(ref path) = args.shutdown_log {
            self.diagnostics.shutdown_log = Some(path.clone());
        }

        if args.verbose {
            self.logging.level = "debug".to_string();
        }

        // An explicit level outranks the verbose shorthand.
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env();

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the settings the warden server runs on.
    pub fn to_settings(&self) -> Result<WardenSettings, ConfigError> {
        self.validate()?;

        let host: IpAddr = self
            .transport
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.transport.host.clone()))?;

        Ok(WardenSettings {
            bind: SocketAddr::new(host, self.transport.port),
            policy: LivenessPolicy {
                heartbeat_timeout: Duration::from_secs(self.liveness.heartbeat_timeout_secs),
                grace_window: Duration::from_secs(self.liveness.grace_window_secs),
                scan_interval: Duration::from_secs(self.liveness.scan_interval_secs),
            },
            dormant_budget: Duration::from_secs(self.lifecycle.dormant_budget_secs),
            bridge_script: self.bridge.script.clone(),
            shutdown_log: self.diagnostics.shutdown_log.clone(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::InvalidTiming("heartbeat timeout must be positive"));
        }
        if self.liveness.grace_window_secs == 0 {
            return Err(ConfigError::InvalidTiming("grace window must be positive"));
        }
        if self.liveness.scan_interval_secs == 0 {
            return Err(ConfigError::InvalidTiming("scan interval must be positive"));
        }
        if self.liveness.scan_interval_secs >= self.liveness.heartbeat_timeout_secs {
            return Err(ConfigError::InvalidTiming(
                "scan interval must be shorter than the heartbeat timeout",
            ));
        }
        if self.liveness.grace_window_secs <= self.liveness.heartbeat_timeout_secs {
            return Err(ConfigError::InvalidTiming(
                "grace window must be longer than the heartbeat timeout",
            ));
        }
        if self.lifecycle.dormant_budget_secs == 0 {
            return Err(ConfigError::InvalidTiming("dormant budget must be positive"));
        }
        Ok(())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Timing values that cannot work together.
    InvalidTiming(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidTiming(reason) => write!(f, "invalid timing configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
