//! Network reachability sampler

use chrono::NaiveDateTime;
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::probe::ProbeExecutor;
use crate::model::{now_local, Host, LinkStatus, NetworkSample};
use crate::store::{Store, StoreError};

/// A monitored host and the address it is probed at
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeTarget {
    pub host: Host,
    pub address: String,
}

impl ProbeTarget {
    pub fn new(host: Host, address: impl Into<String>) -> Self {
        Self {
            host,
            address: address.into(),
        }
    }
}

/// Overall connectivity read from one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    InternetAvailable,
    InternetIssue,
    RouterIssue,
}

impl Verdict {
    pub fn from_statuses(statuses: &HashMap<Host, LinkStatus>) -> Self {
        let is_up = |host: Host| statuses.get(&host).is_some_and(|s| s.is_up());
        let gateway_up = is_up(Host::LocalGateway);
        let any_dns_up = is_up(Host::GoogleDns) || is_up(Host::CloudflareDns);

        match (gateway_up, any_dns_up) {
            (true, true) => Verdict::InternetAvailable,
            (true, false) => Verdict::InternetIssue,
            (false, _) => Verdict::RouterIssue,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::InternetAvailable => "internet available",
            Verdict::InternetIssue => "internet issue",
            Verdict::RouterIssue => "router issue",
        })
    }
}

pub struct NetworkSampler {
    store: Arc<Store>,
    probe: Arc<dyn ProbeExecutor>,
    targets: Vec<ProbeTarget>,
    probe_count: u32,
}

impl NetworkSampler {
    pub fn new(store: Arc<Store>, probe: Arc<dyn ProbeExecutor>, targets: Vec<ProbeTarget>, probe_count: u32) -> Self {
        Self {
            store,
            probe,
            targets,
            probe_count,
        }
    }

    /// Probe every target concurrently and persist one row per host under a shared timestamp
    pub async fn sample_once_at(&self, timestamp: NaiveDateTime) -> Result<Vec<NetworkSample>, StoreError> {
        let probes = self.targets.iter().map(|target| async move {
            match self.probe.probe(&target.address, self.probe_count).await {
                Ok(stats) => {
                    debug!(
                        "{} ({}) UP: latency={:.2}ms jitter={:.2}ms loss={}%",
                        target.host,
                        target.address,
                        stats.avg_latency,
                        stats.jitter(),
                        stats.packet_loss
                    );
                    NetworkSample::up(timestamp, target.host, stats.avg_latency, stats.jitter(), stats.packet_loss)
                }
                Err(e) => {
                    warn!("{} ({}) DOWN: {}", target.host, target.address, e);
                    NetworkSample::down(timestamp, target.host)
                }
            }
        });
        let samples = join_all(probes).await;

        // Every row gets written even if an earlier insert fails
        let store = self.store.clone();
        let (samples, first_error) = tokio::task::spawn_blocking(move || {
            let mut first_error = None;
            for sample in &samples {
                if let Err(e) = store.append_network(sample) {
                    error!("Failed to store network sample for {}: {}", sample.host, e);
                    first_error.get_or_insert(e);
                }
            }
            (samples, first_error)
        })
        .await?;

        let statuses: HashMap<Host, LinkStatus> = samples.iter().map(|s| (s.host, s.status)).collect();
        info!("Network check at {}: {}", timestamp, Verdict::from_statuses(&statuses));

        match first_error {
            Some(e) => Err(e),
            None => Ok(samples),
        }
    }

    pub async fn sample_once(&self) -> Result<Vec<NetworkSample>, StoreError> {
        self.sample_once_at(now_local()).await
    }

    /// Sample forever at a fixed period
    pub async fn run(self: Arc<Self>, period: Duration) {
        info!("Network sampler started (every {:?}, {} targets)", period, self.targets.len());
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sample_once().await {
                error!("Network sampling tick failed: {}", e);
            }
        }
    }
}
