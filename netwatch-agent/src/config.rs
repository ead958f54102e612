//! Configuration loading
//!
//! Handles:
//! - TOML file lookup (`$NETWATCH_CONFIG`, then the OS config directory)
//! - Defaults for every section when the file or a key is absent
//! - Validation of intervals, probe counts and threshold pairs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alerts::{ThresholdConfig, ThresholdError};
use crate::model::Host;
use crate::sampler::ProbeTarget;

pub const CONFIG_ENV: &str = "NETWATCH_CONFIG";
pub const API_KEY_ENV: &str = "NETWATCH_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub system: SystemConfig,
    pub thresholds: ThresholdConfig,
    pub reports: ReportsConfig,
    pub delivery: DeliveryConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub cursor_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub interval_secs: u64,
    pub probe_count: u32,
    pub probe_timeout_secs: u64,
    pub google_dns: String,
    pub cloudflare_dns: String,
    pub gateway: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub interval_secs: u64,
    pub thermal_zone_path: Option<PathBuf>,
    pub disk_mount: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub dir: PathBuf,
    pub retention_hours: u64,
    pub scheduler_poll_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Static allow-list of report recipients
    pub recipients: Vec<String>,
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("netwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            db_path: dir.join("network_monitor.db"),
            cursor_path: dir.join("last_report_date.json"),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interval_secs: 180,
            probe_count: 10,
            probe_timeout_secs: 30,
            google_dns: "8.8.8.8".to_string(),
            cloudflare_dns: "1.1.1.1".to_string(),
            gateway: "192.168.1.1".to_string(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            thermal_zone_path: Some(PathBuf::from("/sys/class/thermal/thermal_zone0/temp")),
            disk_mount: PathBuf::from("/"),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("reports"),
            retention_hours: 24,
            scheduler_poll_secs: 900,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "netwatch-agent".to_string(),
            topic: "netwatch/reports".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn targets(&self) -> Vec<ProbeTarget> {
        vec![
            ProbeTarget::new(Host::GoogleDns, &self.google_dns),
            ProbeTarget::new(Host::CloudflareDns, &self.cloudflare_dns),
            ProbeTarget::new(Host::LocalGateway, &self.gateway),
        ]
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl SystemConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ReportsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    pub fn scheduler_poll(&self) -> Duration {
        Duration::from_secs(self.scheduler_poll_secs)
    }
}

impl MonitorConfig {
    /// Load from the configured location; a missing file yields defaults
    pub async fn load() -> Result<Self, ConfigError> {
        match Self::config_file_path() {
            Some(path) => Self::load_from(&path).await,
            None => Ok(Self::default()),
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|dir| dir.join("netwatch").join("config.toml"))
    }

    /// Shared secret for the HTTP surface; `None` leaves only `/health` reachable
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("network.interval_secs", self.network.interval_secs),
            ("network.probe_count", self.network.probe_count as u64),
            ("network.probe_timeout_secs", self.network.probe_timeout_secs),
            ("system.interval_secs", self.system.interval_secs),
            ("reports.scheduler_poll_secs", self.reports.scheduler_poll_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
        }
        self.thresholds.validate()?;
        Ok(())
    }
}
