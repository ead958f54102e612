//! In-process fakes for the collaborator traits, shared by unit tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::delivery::{Delivery, DeliveryChannel};
use crate::report::{ReportRenderer, ReportSeries, ReportSummary};
use crate::sampler::{ProbeError, ProbeExecutor, ProbeStats, ResourceError, ResourceReader, ResourceReading};

/// Probe answering from a fixed table; unknown addresses are unreachable
#[derive(Default)]
pub struct FakeProbe {
    replies: HashMap<String, ProbeStats>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reachable(mut self, address: &str, min: f64, avg: f64, max: f64, loss: f64) -> Self {
        self.replies.insert(
            address.to_string(),
            ProbeStats {
                min_latency: min,
                avg_latency: avg,
                max_latency: max,
                packet_loss: loss,
            },
        );
        self
    }
}

#[async_trait]
impl ProbeExecutor for FakeProbe {
    async fn probe(&self, address: &str, _count: u32) -> Result<ProbeStats, ProbeError> {
        self.replies.get(address).copied().ok_or_else(|| ProbeError::Failed {
            code: Some(1),
            stderr: format!("{} unreachable", address),
        })
    }
}

pub struct FakeReader {
    reading: Option<ResourceReading>,
}

impl FakeReader {
    pub fn new(cpu_temp: Option<f64>, cpu_usage: f64, ram_usage: f64, storage_usage: f64) -> Self {
        Self {
            reading: Some(ResourceReading {
                cpu_temp,
                cpu_usage,
                ram_usage,
                storage_usage,
                ram_used_mb: ram_usage * 40.96,
                ram_total_mb: 4096.0,
                storage_used_gb: storage_usage * 0.64,
                storage_total_gb: 64.0,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { reading: None }
    }
}

#[async_trait]
impl ResourceReader for FakeReader {
    async fn read_resources(&self) -> Result<ResourceReading, ResourceError> {
        self.reading.clone().ok_or(ResourceError::NoMemory)
    }
}

/// Renderer that writes an empty artifact and remembers what it was given
pub struct RecordingRenderer {
    dir: PathBuf,
    fail: bool,
    summaries: Mutex<Vec<ReportSummary>>,
}

impl RecordingRenderer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail: false,
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(dir: &Path) -> Self {
        Self {
            fail: true,
            ..Self::new(dir)
        }
    }

    pub fn calls(&self) -> usize {
        self.summaries.lock().len()
    }

    pub fn last_summary(&self) -> Option<ReportSummary> {
        self.summaries.lock().last().cloned()
    }
}

impl ReportRenderer for RecordingRenderer {
    fn render(&self, summary: &ReportSummary, _series: &ReportSeries) -> Result<PathBuf> {
        self.summaries.lock().push(summary.clone());
        if self.fail {
            return Err(anyhow!("renderer unavailable"));
        }
        let path = self
            .dir
            .join(format!("report_{}.json", summary.window.start.format("%Y%m%d")));
        std::fs::write(&path, b"{}")?;
        Ok(path)
    }
}

/// Channel recording every successful delivery in order
#[derive(Default)]
pub struct RecordingDelivery {
    unreachable: HashSet<String>,
    sent: Mutex<Vec<(String, Delivery)>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            unreachable: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, Delivery)> {
        self.sent.lock().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn deliver_to(&self, recipient: &str, delivery: &Delivery) -> Result<()> {
        if self.unreachable.contains(recipient) {
            return Err(anyhow!("{} unreachable", recipient));
        }
        self.sent.lock().push((recipient.to_string(), delivery.clone()));
        Ok(())
    }
}

/// Never completes a delivery, like a publish stuck behind a dead broker
pub struct HangingDelivery;

#[async_trait]
impl DeliveryChannel for HangingDelivery {
    async fn deliver_to(&self, _recipient: &str, _delivery: &Delivery) -> Result<()> {
        std::future::pending().await
    }
}
