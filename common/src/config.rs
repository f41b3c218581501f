use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_HTTP_PORT: u16 = 3232;
pub const STATE_FILE_NAME: &str = "last_state.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceTiming {
    /// Pause after closing a port before reopening one.
    pub close_settle_ms: u64,
    /// Time the firmware needs after the port opens (the board resets on open).
    pub boot_settle_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for DeviceTiming {
    fn default() -> Self {
        Self {
            close_settle_ms: 100,
            boot_settle_ms: 2_000,
            io_timeout_ms: 1_000,
        }
    }
}

impl DeviceTiming {
    /// No settle delays, for mock devices.
    pub fn immediate() -> Self {
        Self {
            close_settle_ms: 0,
            boot_settle_ms: 0,
            io_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval_ms: u64,
    pub disabled_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            disabled_interval_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub default_com_port: String,
    pub baud_rate: u32,
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub web_root: PathBuf,
    /// IANA zone for schedule evaluation; host local time when unset.
    pub timezone: Option<String>,
    #[serde(default)]
    pub device: DeviceTiming,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_com_port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            http_port: DEFAULT_HTTP_PORT,
            data_dir: PathBuf::from("config"),
            web_root: PathBuf::from("web"),
            timezone: None,
            device: DeviceTiming::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn state_file(&self) -> PathBuf {
        state_file_in(&self.data_dir)
    }

    pub fn sanitize(&mut self) {
        if self.default_com_port.trim().is_empty() {
            self.default_com_port = Self::default().default_com_port;
        }
        if self.baud_rate == 0 {
            self.baud_rate = DEFAULT_BAUD_RATE;
        }
        if self.scheduler.poll_interval_ms == 0 {
            self.scheduler.poll_interval_ms = SchedulerConfig::default().poll_interval_ms;
        }
        if self.scheduler.disabled_interval_ms < self.scheduler.poll_interval_ms {
            self.scheduler.disabled_interval_ms = self.scheduler.poll_interval_ms;
        }
        if self
            .timezone
            .as_deref()
            .is_some_and(|zone| zone.trim().is_empty())
        {
            self.timezone = None;
        }
    }
}

pub fn state_file_in(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE_NAME)
}
