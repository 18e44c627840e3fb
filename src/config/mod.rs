// ABOUTME: Configuration management for boxwatch
// Handles engine connection settings and session timing, loaded from TOML and overridden by CLI flags

use crate::docker::{ImageReference, PollPolicy};
use crate::session::{MonitorSettings, QuitKey};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Container engine connection
    #[serde(default)]
    pub engine: EngineConfig,

    /// Session timing and probe settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Unix socket exposing the Docker Engine API, e.g. /var/run/docker.sock
    pub unix_socket: Option<PathBuf>,

    /// TCP HTTP address of the Docker Engine API, e.g. localhost:2375
    pub tcp_address: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout: u64,
}

impl EngineConfig {
    /// Note for the user when no address was given and local defaults will be used.
    pub fn transport_notice(&self) -> Option<String> {
        if self.unix_socket.is_some() || self.tcp_address.is_some() {
            return None;
        }
        Some(
            "No engine address given (--unix-addr or --tcp-addr), using local Docker defaults"
                .to_string(),
        )
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unix_socket: None,
            tcp_address: None,
            timeout: default_engine_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Image to run, `name[:tag]`
    #[serde(default = "default_image")]
    pub image: String,

    /// Interval between running-state polls (default: 1000ms)
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for the container after this many polls (default: never)
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,

    /// Interval between load probes (default: 1000ms)
    #[serde(default = "default_interval_ms")]
    pub probe_interval_ms: u64,

    /// Command run inside the container for each probe
    #[serde(default = "crate::session::default_probe_command")]
    pub probe_command: Vec<String>,

    /// Key that ends the session (default: q)
    #[serde(default = "default_quit_key")]
    pub quit_key: char,

    /// Cap on concurrently running probes (default: unlimited)
    #[serde(default)]
    pub max_in_flight_probes: Option<usize>,

    /// End monitoring after this many consecutive probe failures (default: never)
    #[serde(default)]
    pub max_probe_failures: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            poll_interval_ms: default_interval_ms(),
            max_poll_attempts: None,
            probe_interval_ms: default_interval_ms(),
            probe_command: crate::session::default_probe_command(),
            quit_key: default_quit_key(),
            max_in_flight_probes: None,
            max_probe_failures: None,
        }
    }
}

impl SessionConfig {
    pub fn image_reference(&self) -> ImageReference {
        ImageReference::parse(&self.image)
    }

    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            probe_command: self.probe_command.clone(),
            max_in_flight: self.max_in_flight_probes,
            max_probe_failures: self.max_probe_failures,
        }
    }

    pub const fn quit_key(&self) -> QuitKey {
        QuitKey::new(self.quit_key)
    }
}

fn default_engine_timeout() -> u64 {
    120
}

fn default_image() -> String {
    "ubuntu:latest".to_string()
}

const fn default_interval_ms() -> u64 {
    1000
}

const fn default_quit_key() -> char {
    'q'
}

impl AppConfig {
    /// Load configuration from the first existing default location, or defaults.
    pub fn load() -> Result<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.unix_socket.is_some() && self.engine.tcp_address.is_some() {
            bail!("Configure either a Unix socket or a TCP address for the engine, not both");
        }
        if self.session.probe_interval_ms == 0 {
            bail!("probe_interval_ms must be greater than zero");
        }
        if self.session.probe_command.is_empty() {
            bail!("probe_command must not be empty");
        }
        if self.session.max_in_flight_probes == Some(0) {
            bail!("max_in_flight_probes must be greater than zero");
        }
        Ok(())
    }

    /// Get configuration file paths in order of precedence
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        // 1. Local project config
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(".boxwatch").join("config.toml"));
        }

        // 2. User config (~/.boxwatch/config.toml)
        if let Ok(config_dir) = Self::get_user_config_dir() {
            paths.push(config_dir.join("config.toml"));
        }

        paths
    }

    /// Get user configuration directory
    pub fn get_user_config_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".boxwatch"))
    }
}
