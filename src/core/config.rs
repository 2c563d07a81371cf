//! Configuration management

use crate::hid::DeviceIdentity;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Dongle identity and interface selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB Vendor ID
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    /// USB Product ID
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    /// Usage page of the command/response interface
    #[serde(default = "default_command_usage_page")]
    pub command_usage_page: u16,
    /// Usage page of the link event interface
    #[serde(default = "default_event_usage_page")]
    pub event_usage_page: u16,
}

fn default_vendor_id() -> u16 {
    0x0C45
}
fn default_product_id() -> u16 {
    0xFDFD
}
fn default_command_usage_page() -> u16 {
    0xFF60
}
fn default_event_usage_page() -> u16 {
    0xFFFF
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            command_usage_page: default_command_usage_page(),
            event_usage_page: default_event_usage_page(),
        }
    }
}

impl DeviceConfig {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

/// Lower bound for the idle interval and the listen timeout
pub const MIN_WAIT_MS: u64 = 1;

/// Polling and probe timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait between discovery attempts while no dongle is present
    #[serde(default = "default_idle_interval")]
    pub idle_interval_ms: u64,
    /// Event interface read timeout while listening
    #[serde(default = "default_listen_timeout")]
    pub listen_timeout_ms: u64,
    /// Read timeout for each probe during the handshake
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Pause after the INIT command before probing
    #[serde(default = "default_init_settle")]
    pub init_settle_ms: u64,
    /// Number of PING rounds in the handshake
    #[serde(default = "default_probe_rounds")]
    pub probe_rounds: u32,
    /// Read timeout used to drain the command interface while listening
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

fn default_idle_interval() -> u64 {
    2000
}
fn default_listen_timeout() -> u64 {
    1000
}
fn default_probe_timeout() -> u64 {
    50
}
fn default_init_settle() -> u64 {
    50
}
fn default_probe_rounds() -> u32 {
    10
}
fn default_drain_timeout() -> u64 {
    1
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval(),
            listen_timeout_ms: default_listen_timeout(),
            probe_timeout_ms: default_probe_timeout(),
            init_settle_ms: default_init_settle(),
            probe_rounds: default_probe_rounds(),
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}

impl TimingConfig {
    /// All delays zero; used to drive the monitor without sleeping
    pub fn immediate() -> Self {
        Self {
            idle_interval_ms: 0,
            listen_timeout_ms: 0,
            probe_timeout_ms: 0,
            init_settle_ms: 0,
            probe_rounds: default_probe_rounds(),
            drain_timeout_ms: 0,
        }
    }

    /// Raise waits that must block to at least [`MIN_WAIT_MS`].
    ///
    /// hidapi treats a zero read timeout as non-blocking, so a zero idle
    /// interval or listen timeout would spin the monitor loop.
    pub fn clamped(mut self) -> Self {
        for (name, value) in [
            ("idle_interval_ms", &mut self.idle_interval_ms),
            ("listen_timeout_ms", &mut self.listen_timeout_ms),
        ] {
            if *value < MIN_WAIT_MS {
                warn!("timing.{} = {} is too short, using {}", name, value, MIN_WAIT_MS);
                *value = MIN_WAIT_MS;
            }
        }
        self
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn init_settle(&self) -> Duration {
        Duration::from_millis(self.init_settle_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Commands run on link changes. Each is a program followed by its arguments;
/// an empty list disables the action for that state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default = "default_switch_command")]
    pub on_connect: Vec<String>,
    #[serde(default = "default_switch_command")]
    pub on_disconnect: Vec<String>,
}

/// Input source switch key combination for the host platform
fn default_switch_command() -> Vec<String> {
    #[cfg(target_os = "linux")]
    let argv: &[&str] = &["xdotool", "key", "super+space"];

    #[cfg(target_os = "macos")]
    let argv: &[&str] = &[
        "osascript",
        "-e",
        "tell application \"System Events\" to key code 49 using {control down}",
    ];

    #[cfg(target_os = "windows")]
    let argv: &[&str] = &["powershell", "-NoProfile", "-Command", WIN_SPACE_SCRIPT];

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    let argv: &[&str] = &[];

    argv.iter().map(|s| s.to_string()).collect()
}

/// Presses and releases Win+Space through user32's keybd_event
#[cfg(target_os = "windows")]
const WIN_SPACE_SCRIPT: &str = r#"$k = Add-Type -PassThru -Name Kbd -Namespace DongleLink -MemberDefinition '[DllImport("user32.dll")] public static extern void keybd_event(byte vk, byte scan, uint flags, UIntPtr extra);'; $k::keybd_event(0x5B, 0, 0, [UIntPtr]::Zero); $k::keybd_event(0x20, 0, 0, [UIntPtr]::Zero); $k::keybd_event(0x20, 0, 2, [UIntPtr]::Zero); $k::keybd_event(0x5B, 0, 2, [UIntPtr]::Zero)"#;

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            on_connect: default_switch_command(),
            on_disconnect: default_switch_command(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dongle identity and interface pages
    #[serde(default)]
    pub device: DeviceConfig,
    /// Polling and probe timing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Link change actions
    #[serde(default)]
    pub action: ActionConfig,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, falling back to defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.timing = config.timing.clamped();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "donglelink", "DongleLinkMonitor")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }
}
