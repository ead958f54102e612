//! Status contracts served to the front-end

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::model::{timestamp_serde, Host, LinkStatus, NetworkSample};
use crate::sampler::ResourceReading;
use crate::store::HostReading;

/// Most recent reading of one host, or `unknown` before its first sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum HostState {
    Known {
        latency: Option<f64>,
        jitter: Option<f64>,
        packet_loss: Option<f64>,
        status: LinkStatus,
        #[serde(with = "timestamp_serde")]
        last_checked: NaiveDateTime,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStatus {
    pub host: Host,
    #[serde(flatten)]
    pub state: HostState,
}

impl HostStatus {
    pub fn from_reading(host: Host, reading: HostReading) -> Self {
        let state = match reading {
            HostReading::Seen(NetworkSample {
                timestamp,
                latency,
                jitter,
                packet_loss,
                status,
                ..
            }) => HostState::Known {
                latency,
                jitter,
                packet_loss,
                status,
                last_checked: timestamp,
            },
            HostReading::Unknown => HostState::Unknown,
        };
        Self { host, state }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub cpu_temp: Option<f64>,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub ram_used_mb: f64,
    pub ram_total_mb: f64,
    pub storage_usage: f64,
    pub storage_used_gb: f64,
    pub storage_total_gb: f64,
    pub uptime_seconds: u64,
    pub uptime: String,
}

impl SystemStatus {
    pub fn new(reading: ResourceReading, uptime_seconds: u64) -> Self {
        Self {
            cpu_temp: reading.cpu_temp,
            cpu_usage: reading.cpu_usage,
            ram_usage: reading.ram_usage,
            ram_used_mb: reading.ram_used_mb,
            ram_total_mb: reading.ram_total_mb,
            storage_usage: reading.storage_usage,
            storage_used_gb: reading.storage_used_gb,
            storage_total_gb: reading.storage_total_gb,
            uptime_seconds,
            uptime: format_uptime(uptime_seconds),
        }
    }
}

/// "D days, H hours, M minutes, S seconds", dropping zero units other than seconds
pub fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = total_seconds % 86_400 / 3600;
    let minutes = total_seconds % 3600 / 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::with_capacity(4);
    for (value, unit) in [(days, "days"), (hours, "hours"), (minutes, "minutes")] {
        if value > 0 {
            parts.push(format!("{} {}", value, unit));
        }
    }
    parts.push(format!("{} seconds", seconds));
    parts.join(", ")
}
