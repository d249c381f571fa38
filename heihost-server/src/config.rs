//! Configuration for the image hosting service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use heihost_core::ServerConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Screenshot capture settings.
    pub capture: CaptureConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Seconds a client may stay silent before it is disconnected.
    pub client_timeout_secs: u64,
}

/// Screenshot capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Image file the capture task reads.
    pub source: PathBuf,
    /// Screenshot width in pixels. Must be even.
    pub width: u32,
    /// Screenshot height in pixels.
    pub height: u32,
    /// Seconds between captures. A single capture is taken if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

/// A setting that cannot be served with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("image width must be even to combine 4-bit values, got {0}")]
    OddWidth(u32),

    #[error("image size {width}x{height} must be non-zero and at most 65535 per side")]
    BadDimensions { width: u32, height: u32 },

    #[error("client timeout must be at least one second")]
    ZeroTimeout,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: heihost_core::server::DEFAULT_PORT,
            client_timeout_secs: heihost_core::server::DEFAULT_CLIENT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("screenshot.png"),
            width: 1200,
            height: 825,
            interval_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl CaptureConfig {
    /// Capture cadence, if periodic.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Reject settings the pipeline or the protocol cannot handle.
    ///
    /// Runs before the capture task starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let CaptureConfig { width, height, .. } = self.capture;
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(ConfigError::BadDimensions { width, height });
        }
        if width % 2 != 0 {
            return Err(ConfigError::OddWidth(width));
        }
        if self.network.client_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Connection settings for the core server.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_port: self.network.port,
            client_timeout: Duration::from_secs(self.network.client_timeout_secs),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
