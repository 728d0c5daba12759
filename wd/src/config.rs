//! Watchdog configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::health::RequiredProcesses;
use crate::supervisor::DEFAULT_SOCKET_PATH;

/// System-wide config location
const SYSTEM_CONFIG: &str = "/etc/epidose/watchdog.yml";

/// Main watchdog configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to reach supervisord
    pub supervisor: SupervisorConfig,

    /// Processes that must be running
    pub processes: RequiredProcesses,

    /// Pulse and poll cadence
    pub timing: TimingConfig,

    /// Status LED backend
    pub indicator: IndicatorConfig,

    /// Daemon bootstrap paths
    pub daemon: DaemonConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.processes.is_empty() {
            return Err(eyre::eyre!("No processes to watch: processes.names is empty"));
        }

        let mut seen = HashSet::new();
        for name in self.processes.iter() {
            if name.is_empty() {
                return Err(eyre::eyre!("Empty process name in processes.names"));
            }
            if name.contains(':') {
                return Err(eyre::eyre!(
                    "Process name '{}' must not contain ':' (the group is added automatically)",
                    name
                ));
            }
            if !seen.insert(name) {
                return Err(eyre::eyre!("Duplicate process name '{}'", name));
            }
        }

        if self.timing.pause_ms == 0 {
            return Err(eyre::eyre!("timing.pause-ms must be greater than zero"));
        }
        if self.timing.pulse_ms >= self.timing.pause_ms {
            return Err(eyre::eyre!(
                "timing.pulse-ms ({}) must be shorter than timing.pause-ms ({})",
                self.timing.pulse_ms,
                self.timing.pause_ms
            ));
        }

        if self.indicator.kind == IndicatorKind::Led && self.indicator.path.as_os_str().is_empty() {
            return Err(eyre::eyre!("indicator.path is required for the led indicator"));
        }

        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::fallback_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read `daemon.log-file` early, before logging is set up
    ///
    /// Follows the same chain as [`Config::load`] but never logs; anything
    /// unreadable falls through to the default so `load` can report it.
    pub fn load_log_file(config_path: Option<&PathBuf>) -> PathBuf {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::fallback_paths(),
        };

        candidates
            .iter()
            .filter(|candidate| candidate.exists())
            .find_map(|candidate| {
                let content = fs::read_to_string(candidate).ok()?;
                serde_yaml::from_str::<Self>(&content).ok()
            })
            .map(|config| config.daemon.log_file)
            .unwrap_or_else(|| DaemonConfig::default().log_file)
    }

    fn fallback_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("epidose").join("watchdog.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// supervisord connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Unix socket served by supervisord's `[unix_http_server]`
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    /// Per-call socket timeout in milliseconds (none by default)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            timeout_ms: None,
        }
    }
}

impl SupervisorConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Pulse and poll cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the LED stays on for a healthy cycle
    #[serde(rename = "pulse-ms")]
    pub pulse_ms: u64,

    /// Idle time between cycles
    #[serde(rename = "pause-ms")]
    pub pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pulse_ms: 200,
            pause_ms: 2000,
        }
    }
}

/// Indicator backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    /// LED class device under /sys/class/leds
    #[default]
    Led,
    /// Raw sysfs GPIO pin
    Gpio,
    /// No hardware, log transitions only
    Log,
}

impl std::str::FromStr for IndicatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "led" => Ok(Self::Led),
            "gpio" => Ok(Self::Gpio),
            "log" | "none" => Ok(Self::Log),
            _ => Err(format!("Unknown indicator: {}. Use: led, gpio, or log", s)),
        }
    }
}

/// Status LED backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub kind: IndicatorKind,

    /// LED class directory (led)
    pub path: PathBuf,

    /// GPIO line number (gpio)
    pub pin: u32,

    /// sysfs GPIO root (gpio)
    #[serde(rename = "sysfs-root")]
    pub sysfs_root: PathBuf,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            kind: IndicatorKind::Led,
            path: PathBuf::from("/sys/class/leds/green"),
            pin: 17,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

/// Daemon bootstrap paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// PID file guarding against a second instance
    #[serde(rename = "pid-file")]
    pub pid_file: PathBuf,

    /// Log file used when not in debug mode
    #[serde(rename = "log-file")]
    pub log_file: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from("/run/epidose/watchdog.pid"),
            log_file: PathBuf::from("/var/log/epidose/watchdog.log"),
        }
    }
}
