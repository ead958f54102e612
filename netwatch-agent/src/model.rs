//! Sample types shared by the samplers, the store and the report path
//!
//! Timestamps are local wall-clock times persisted as `YYYY-MM-DD HH:MM:SS`
//! strings, whose lexicographic order is their chronological order.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persisted timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to whole seconds
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
}

/// Serde adapter keeping the persisted layout in JSON output
pub mod timestamp_serde {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Monitored hosts. The set is fixed; only their addresses are configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Host {
    #[serde(rename = "Google DNS")]
    GoogleDns,
    #[serde(rename = "Cloudflare DNS")]
    CloudflareDns,
    #[serde(rename = "Local Gateway")]
    LocalGateway,
}

impl Host {
    pub const ALL: [Host; 3] = [Host::GoogleDns, Host::CloudflareDns, Host::LocalGateway];

    pub fn name(&self) -> &'static str {
        match self {
            Host::GoogleDns => "Google DNS",
            Host::CloudflareDns => "Cloudflare DNS",
            Host::LocalGateway => "Local Gateway",
        }
    }

    pub fn is_dns(&self) -> bool {
        !matches!(self, Host::LocalGateway)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown host: {0}")]
pub struct UnknownHost(pub String);

impl FromStr for Host {
    type Err = UnknownHost;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Host::ALL
            .into_iter()
            .find(|host| host.name() == s)
            .ok_or_else(|| UnknownHost(s.to_string()))
    }
}

/// Reachability of one host at one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkStatus {
    Up,
    Down,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Up => "UP",
            LinkStatus::Down => "DOWN",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, LinkStatus::Up)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown link status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for LinkStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(LinkStatus::Up),
            "DOWN" => Ok(LinkStatus::Down),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the `network_logs` series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
    pub host: Host,
    /// Average round-trip time (ms)
    pub latency: Option<f64>,
    /// Max minus min round-trip time (ms)
    pub jitter: Option<f64>,
    /// Packet loss (%)
    pub packet_loss: Option<f64>,
    pub status: LinkStatus,
}

impl NetworkSample {
    pub fn up(timestamp: NaiveDateTime, host: Host, latency: f64, jitter: f64, packet_loss: f64) -> Self {
        Self {
            timestamp,
            host,
            latency: Some(latency),
            jitter: Some(jitter),
            packet_loss: Some(packet_loss),
            status: LinkStatus::Up,
        }
    }

    pub fn down(timestamp: NaiveDateTime, host: Host) -> Self {
        Self {
            timestamp,
            host,
            latency: None,
            jitter: None,
            packet_loss: None,
            status: LinkStatus::Down,
        }
    }
}

/// One row of the `system_resources` series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSample {
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
    /// CPU temperature (°C), `None` when no sensor is available
    pub cpu_temp: Option<f64>,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub storage_usage: f64,
}
