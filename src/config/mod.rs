use log::info;
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_PATHS: [&str; 2] = ["config/smartmeter.yaml", "smartmeter.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on config/smartmeter.yaml or smartmeter.yaml")]
    NotFound,
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(String),
}

fn httpd_enabled_default() -> bool { return true }
fn httpd_port_default() -> u16 { return 8080 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HttpdConfig {
    #[serde(default="httpd_enabled_default")]
    pub enabled: bool,
    #[serde(default="httpd_port_default")]
    pub port: u16
}

fn d0_enabled_default() -> bool { return true }
fn d0_section_default() -> String { return "smartmeter_d0".to_string() }
fn d0_read_interval_default() -> u64 { return 5 }
fn d0_invocation_timeout_default() -> u64 { return 10 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct D0Config {
    #[serde(default="d0_enabled_default")]
    pub enabled: bool,
    pub serial_port: String,
    #[serde(default="d0_section_default")]
    pub section: String,
    #[serde(default="d0_read_interval_default")]
    pub read_interval: u64,         // Seconds between two datagram reads
    #[serde(default="d0_invocation_timeout_default")]
    pub invocation_timeout: u64,    // Seconds one read may take at most
}

fn s0_enabled_default() -> bool { return true }
fn s0_section_default() -> String { return "smartmeter_s0".to_string() }
fn s0_debounce_ms_default() -> u64 { return 200 }
fn s0_poll_interval_ms_default() -> u64 { return 5 }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct S0Config {
    #[serde(default="s0_enabled_default")]
    pub enabled: bool,
    pub pin: u32,                   // BCM number of the pin wired to S0-
    #[serde(default="s0_section_default")]
    pub section: String,
    #[serde(default="s0_debounce_ms_default")]
    pub debounce_ms: u64,
    #[serde(default="s0_poll_interval_ms_default")]
    pub poll_interval_ms: u64,
}

fn httpd_default() -> HttpdConfig { return HttpdConfig { enabled: httpd_enabled_default(), port: httpd_port_default() } }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default="httpd_default")]
    pub httpd: HttpdConfig,
    pub d0: Option<D0Config>,
    pub s0: Option<S0Config>,
}

impl Config {
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_str(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Try config/smartmeter.yaml first, then smartmeter.yaml
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS.iter().map(Path::new) {
            if path.exists() {
                return Self::load_from(path);
            }
        }
        Err(ConfigError::NotFound)
    }

    /// The D0 part if configured and enabled
    pub fn d0_enabled(&self) -> Option<&D0Config> {
        self.d0.as_ref().filter(|c| c.enabled)
    }

    pub fn s0_enabled(&self) -> Option<&S0Config> {
        self.s0.as_ref().filter(|c| c.enabled)
    }
}
