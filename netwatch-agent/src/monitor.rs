//! Monitor facade
//!
//! The operations a front-end calls: live network and system status,
//! alert draining, on-demand reports, threshold updates and the IP
//! configuration. The HTTP layer is a thin wrapper over this type.

use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;

use crate::alerts::{Alert, ThresholdConfig, ThresholdError, ThresholdEvaluator, ThresholdPair};
use crate::ipinfo::{self, IpConfig};
use crate::model::Host;
use crate::report::{ReportError, ReportOutcome, ReportService};
use crate::sampler::{ResourceError, ResourceReader};
use crate::status::{HostStatus, SystemStatus};
use crate::store::{Store, StoreError};

pub struct Monitor {
    store: Arc<Store>,
    evaluator: Arc<ThresholdEvaluator>,
    reader: Arc<dyn ResourceReader>,
    reports: Arc<ReportService>,
    public_ip_url: String,
    lookup_timeout: Duration,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        evaluator: Arc<ThresholdEvaluator>,
        reader: Arc<dyn ResourceReader>,
        reports: Arc<ReportService>,
    ) -> Self {
        Self {
            store,
            evaluator,
            reader,
            reports,
            public_ip_url: ipinfo::PUBLIC_IP_URL.to_string(),
            lookup_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_public_ip_url(mut self, url: impl Into<String>) -> Self {
        self.public_ip_url = url.into();
        self
    }

    /// Latest reading for every monitored host
    pub async fn live_status(&self) -> Result<Vec<HostStatus>, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<HostStatus>, StoreError> {
            Host::ALL
                .into_iter()
                .map(|host| Ok(HostStatus::from_reading(host, store.latest(host)?)))
                .collect()
        })
        .await?
    }

    pub async fn system_status(&self) -> Result<SystemStatus, ResourceError> {
        let reading = self.reader.read_resources().await?;
        Ok(SystemStatus::new(reading, System::uptime()))
    }

    pub fn drain_alerts(&self) -> Vec<Alert> {
        self.evaluator.drain_alerts()
    }

    /// Blocking: runs store queries and the renderer on the calling thread
    pub fn generate_report(&self, kind: &str, date: Option<&str>) -> Result<ReportOutcome, ReportError> {
        self.reports.generate(kind, date)
    }

    pub fn set_threshold(&self, metric: &str, level: &str, value: &str) -> Result<ThresholdPair, ThresholdError> {
        self.evaluator.set_threshold(metric, level, value)
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.evaluator.thresholds()
    }

    pub async fn ip_config(&self) -> IpConfig {
        ipinfo::lookup(&self.public_ip_url, self.lookup_timeout).await
    }
}
