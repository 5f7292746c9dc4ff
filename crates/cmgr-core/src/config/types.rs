//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the management service (ws:// or wss://)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Human-readable agent name
    #[serde(default)]
    pub agent_name: String,
    /// Agent identity presented on connect
    #[serde(default)]
    pub agent_id: String,
    /// Credential presented on connect
    #[serde(default)]
    pub secret_key: String,
    /// Template / configuration ID announced at startup
    #[serde(default)]
    pub template_id: String,
    /// Seconds between status reports (default: 60)
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Seconds a connection lives before it is rotated (default: 1800)
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    /// Ceiling for the delay between failed connection attempts (default: 300)
    #[serde(default = "default_max_connect_backoff_secs")]
    pub max_connect_backoff_secs: u64,
    /// Capacity of the inbound and outbound message queues (default: 50)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Managed collector settings
    #[serde(default)]
    pub collector: CollectorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            agent_name: String::new(),
            agent_id: String::new(),
            secret_key: String::new(),
            template_id: String::new(),
            status_interval_secs: default_status_interval_secs(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            max_connect_backoff_secs: default_max_connect_backoff_secs(),
            buffer_size: default_buffer_size(),
            collector: CollectorSettings::default(),
        }
    }
}

impl Config {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn max_connect_backoff(&self) -> Duration {
        Duration::from_secs(self.max_connect_backoff_secs)
    }
}

/// Managed collector process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// Collector executable (default: `otelcol`)
    #[serde(default = "default_collector_binary")]
    pub binary: PathBuf,
    /// Collector YAML configuration, rewritten by reconfigure tasks
    #[serde(default = "default_collector_config_path")]
    pub config_path: PathBuf,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            binary: default_collector_binary(),
            config_path: default_collector_config_path(),
        }
    }
}

fn default_endpoint() -> String {
    "wss://localhost/v1/connect".to_string()
}

fn default_status_interval_secs() -> u64 {
    60
}

fn default_reconnect_interval_secs() -> u64 {
    30 * 60
}

fn default_max_connect_backoff_secs() -> u64 {
    5 * 60
}

fn default_buffer_size() -> usize {
    50
}

fn default_collector_binary() -> PathBuf {
    PathBuf::from("otelcol")
}

fn default_collector_config_path() -> PathBuf {
    PathBuf::from("./config.yaml")
}
