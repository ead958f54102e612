//! IP configuration lookup
//!
//! - Private IPv4 addresses from the local interfaces, minus loopback
//!   (`127.*`) and link-local (`169.*`) ranges
//! - Public IP as reported by an external echo service
//!
//! Each half fails independently; the error text is reported in place of
//! the value.

use anyhow::{Context, Result};
use if_addrs::{get_if_addrs, IfAddr};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

pub const PUBLIC_IP_URL: &str = "https://api.ipify.org";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpConfig {
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_error: Option<String>,
    pub private_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_error: Option<String>,
}

fn is_reportable(ip: &Ipv4Addr) -> bool {
    let [first, ..] = ip.octets();
    first != 127 && first != 169
}

pub fn private_ips() -> Result<Vec<String>> {
    let if_addrs = get_if_addrs().context("Failed to enumerate network interfaces")?;
    let ips = if_addrs
        .into_iter()
        .filter_map(|if_addr| match if_addr.addr {
            IfAddr::V4(v4) if is_reportable(&v4.ip) => Some(v4.ip.to_string()),
            _ => None,
        })
        .collect();
    Ok(ips)
}

pub async fn public_ip(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .get(url)
        .header("User-Agent", "netwatch-agent")
        .send()
        .await
        .context("Public IP request failed")?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!("Public IP service returned {}", response.status()));
    }

    let body = response.text().await.context("Failed to read public IP response")?;
    Ok(body.trim().to_string())
}

pub async fn lookup(url: &str, timeout: Duration) -> IpConfig {
    let mut config = IpConfig::default();

    match public_ip(url, timeout).await {
        Ok(ip) => config.public_ip = Some(ip),
        Err(e) => {
            debug!("Public IP lookup failed: {:#}", e);
            config.public_ip_error = Some(format!("{:#}", e));
        }
    }
    match private_ips() {
        Ok(ips) => config.private_ips = ips,
        Err(e) => config.private_ip_error = Some(format!("{:#}", e)),
    }

    config
}
