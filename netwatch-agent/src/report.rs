//! Report assembly
//!
//! Resolves a window, reads both series for it and reduces them to:
//! - uptime/downtime from the Google DNS UP ratio
//! - mean network and system metrics (nulls skipped), with network means
//!   also broken down per host
//! - downtime cause percentages
//! - per-metric series for charting
//!
//! Rendering is delegated to a [`ReportRenderer`]; a successful render is
//! followed by a retention purge of the report directory.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::{classify, DowntimeBreakdown};
use crate::model::{now_local, timestamp_serde, Host, NetworkSample, SystemSample};
use crate::purge::Purger;
use crate::store::{Store, StoreError};
use crate::window::{resolve, resolve_named, ReportWindow, WindowError, WindowKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NetworkAverages {
    pub latency: Option<f64>,
    pub jitter: Option<f64>,
    pub packet_loss: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostAverages {
    pub host: Host,
    #[serde(flatten)]
    pub averages: NetworkAverages,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemAverages {
    pub cpu_temp: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<f64>,
    pub storage_usage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DowntimeShares {
    pub no_electricity_pct: f64,
    pub no_internet_pct: f64,
    pub nominal_pct: f64,
    pub buckets: DowntimeBreakdown,
}

impl From<DowntimeBreakdown> for DowntimeShares {
    fn from(buckets: DowntimeBreakdown) -> Self {
        Self {
            no_electricity_pct: buckets.no_electricity_pct(),
            no_internet_pct: buckets.no_internet_pct(),
            nominal_pct: buckets.nominal_pct(),
            buckets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub window: ReportWindow,
    #[serde(with = "timestamp_serde")]
    pub generated_at: NaiveDateTime,
    pub uptime_pct: f64,
    pub downtime_pct: f64,
    pub network: NetworkAverages,
    pub network_by_host: Vec<HostAverages>,
    pub system: SystemAverages,
    pub downtime: DowntimeShares,
    pub network_samples: usize,
    pub system_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<Host>,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSeries {
    pub metrics: Vec<MetricSeries>,
}

impl ReportSeries {
    pub fn find(&self, metric: &str, host: Option<Host>) -> Option<&MetricSeries> {
        self.metrics.iter().find(|s| s.metric == metric && s.host == host)
    }
}

/// Turns an assembled report into an artifact on disk
pub trait ReportRenderer: Send + Sync {
    fn render(&self, summary: &ReportSummary, series: &ReportSeries) -> anyhow::Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Generated(PathBuf),
    /// Both series were empty for the window
    NoData,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("Store query failed: {0}")]
    Store(#[from] StoreError),
    #[error("Report rendering failed: {0:#}")]
    Render(anyhow::Error),
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values.flatten().fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn network_averages<'a>(rows: impl Iterator<Item = &'a NetworkSample> + Clone) -> NetworkAverages {
    NetworkAverages {
        latency: mean(rows.clone().map(|s| s.latency)),
        jitter: mean(rows.clone().map(|s| s.jitter)),
        packet_loss: mean(rows.map(|s| s.packet_loss)),
    }
}

/// Hosts without rows in the window are left out
fn host_averages(network: &[NetworkSample]) -> Vec<HostAverages> {
    Host::ALL
        .iter()
        .filter(|host| network.iter().any(|s| s.host == **host))
        .map(|&host| HostAverages {
            host,
            averages: network_averages(network.iter().filter(move |s| s.host == host)),
        })
        .collect()
}

fn uptime_pct(network: &[NetworkSample]) -> f64 {
    let (up, total) = network
        .iter()
        .filter(|s| s.host == Host::GoogleDns)
        .fold((0usize, 0usize), |(up, total), s| (up + s.status.is_up() as usize, total + 1));
    if total == 0 {
        0.0
    } else {
        up as f64 / total as f64 * 100.0
    }
}

fn network_series(network: &[NetworkSample]) -> Vec<MetricSeries> {
    let mut out = Vec::new();
    let fields: [(&'static str, fn(&NetworkSample) -> Option<f64>); 3] = [
        ("latency", |s| s.latency),
        ("jitter", |s| s.jitter),
        ("packet_loss", |s| s.packet_loss),
    ];

    for (metric, value) in fields {
        for host in Host::ALL {
            out.push(MetricSeries {
                metric,
                host: Some(host),
                points: network
                    .iter()
                    .filter(|s| s.host == host)
                    .map(|s| SeriesPoint {
                        timestamp: s.timestamp,
                        value: value(s),
                    })
                    .collect(),
            });
        }
    }

    out.push(MetricSeries {
        metric: "availability",
        host: Some(Host::GoogleDns),
        points: network
            .iter()
            .filter(|s| s.host == Host::GoogleDns)
            .map(|s| SeriesPoint {
                timestamp: s.timestamp,
                value: Some(if s.status.is_up() { 1.0 } else { 0.0 }),
            })
            .collect(),
    });
    out
}

fn system_series(system: &[SystemSample]) -> Vec<MetricSeries> {
    let fields: [(&'static str, fn(&SystemSample) -> Option<f64>); 4] = [
        ("cpu_temp", |s| s.cpu_temp),
        ("cpu_usage", |s| Some(s.cpu_usage)),
        ("ram_usage", |s| Some(s.ram_usage)),
        ("storage_usage", |s| Some(s.storage_usage)),
    ];

    fields
        .into_iter()
        .map(|(metric, value)| MetricSeries {
            metric,
            host: None,
            points: system
                .iter()
                .map(|s| SeriesPoint {
                    timestamp: s.timestamp,
                    value: value(s),
                })
                .collect(),
        })
        .collect()
}

/// Reduce one window's rows to a summary and chart series; `None` when both series are empty
pub fn assemble(
    window: ReportWindow,
    generated_at: NaiveDateTime,
    network: &[NetworkSample],
    system: &[SystemSample],
) -> Option<(ReportSummary, ReportSeries)> {
    if network.is_empty() && system.is_empty() {
        return None;
    }

    let uptime = uptime_pct(network);
    let summary = ReportSummary {
        window,
        generated_at,
        uptime_pct: uptime,
        downtime_pct: if network.iter().any(|s| s.host == Host::GoogleDns) {
            100.0 - uptime
        } else {
            0.0
        },
        network: network_averages(network.iter()),
        network_by_host: host_averages(network),
        system: SystemAverages {
            cpu_temp: mean(system.iter().map(|s| s.cpu_temp)),
            cpu_usage: mean(system.iter().map(|s| Some(s.cpu_usage))),
            ram_usage: mean(system.iter().map(|s| Some(s.ram_usage))),
            storage_usage: mean(system.iter().map(|s| Some(s.storage_usage))),
        },
        downtime: classify(network).into(),
        network_samples: network.len(),
        system_samples: system.len(),
    };

    let mut metrics = network_series(network);
    metrics.extend(system_series(system));
    Some((summary, ReportSeries { metrics }))
}

pub struct ReportService {
    store: Arc<Store>,
    renderer: Arc<dyn ReportRenderer>,
    purger: Arc<Purger>,
}

impl ReportService {
    pub fn new(store: Arc<Store>, renderer: Arc<dyn ReportRenderer>, purger: Arc<Purger>) -> Self {
        Self {
            store,
            renderer,
            purger,
        }
    }

    pub fn purger(&self) -> &Arc<Purger> {
        &self.purger
    }

    /// Generate a report for a named window relative to the current time
    pub fn generate(&self, kind: &str, date: Option<&str>) -> Result<ReportOutcome, ReportError> {
        self.generate_at(now_local(), kind, date)
    }

    pub fn generate_at(&self, now: NaiveDateTime, kind: &str, date: Option<&str>) -> Result<ReportOutcome, ReportError> {
        let window = resolve_named(now, kind, date)?;
        self.generate_window(window, now)
    }

    /// The full calendar day `date`
    pub fn generate_for_date(&self, now: NaiveDateTime, date: NaiveDate) -> Result<ReportOutcome, ReportError> {
        let window = resolve(now, WindowKind::Custom, Some(date))?;
        self.generate_window(window, now)
    }

    pub fn generate_window(&self, window: ReportWindow, now: NaiveDateTime) -> Result<ReportOutcome, ReportError> {
        let network = self.store.range_network(window.start, window.end)?;
        let system = self.store.range_system(window.start, window.end)?;

        let Some((summary, series)) = assemble(window, now, &network, &system) else {
            warn!("No data for {} report [{}, {})", window.kind, window.start, window.end);
            return Ok(ReportOutcome::NoData);
        };

        let path = self.renderer.render(&summary, &series).map_err(ReportError::Render)?;
        info!(
            "Generated {} report [{}, {}) at {} (uptime {:.2}%)",
            window.kind,
            window.start,
            window.end,
            path.display(),
            summary.uptime_pct
        );

        self.purger.purge();
        Ok(ReportOutcome::Generated(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;
    use crate::testkit::RecordingRenderer;
    use std::time::{Duration, SystemTime};

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn system(at: &str, cpu_temp: Option<f64>, cpu: f64) -> SystemSample {
        SystemSample {
            timestamp: ts(at),
            cpu_temp,
            cpu_usage: cpu,
            ram_usage: 50.0,
            storage_usage: 40.0,
        }
    }

    fn window() -> ReportWindow {
        resolve(ts("2024-01-02 10:00:00"), WindowKind::Yesterday, None).unwrap()
    }

    #[test]
    fn test_assemble_summary() {
        let t1 = ts("2024-01-01 08:00:00");
        let t2 = ts("2024-01-01 08:03:00");
        let network = vec![
            NetworkSample::up(t1, Host::GoogleDns, 10.0, 2.0, 0.0),
            NetworkSample::up(t1, Host::CloudflareDns, 20.0, 4.0, 10.0),
            NetworkSample::up(t1, Host::LocalGateway, 3.0, 0.0, 0.0),
            NetworkSample::down(t2, Host::GoogleDns),
            NetworkSample::down(t2, Host::CloudflareDns),
            NetworkSample::down(t2, Host::LocalGateway),
        ];
        let system = vec![
            system("2024-01-01 08:00:00", Some(50.0), 10.0),
            system("2024-01-01 08:01:00", None, 30.0),
        ];

        let (summary, series) = assemble(window(), t2, &network, &system).unwrap();
        assert_eq!(summary.uptime_pct, 50.0);
        assert_eq!(summary.downtime_pct, 50.0);
        assert_eq!(summary.network.latency, Some(11.0));
        assert_eq!(summary.network.jitter, Some(2.0));
        let google = &summary.network_by_host[0];
        assert_eq!(google.host, Host::GoogleDns);
        assert_eq!(google.averages.latency, Some(10.0));
        assert_eq!(summary.network_by_host[2].averages.latency, Some(3.0));
        assert_eq!(summary.system.cpu_temp, Some(50.0));
        assert_eq!(summary.system.cpu_usage, Some(20.0));
        assert_eq!(summary.downtime.buckets.total, 2);
        assert_eq!(summary.downtime.no_electricity_pct, 50.0);
        assert_eq!(summary.downtime.nominal_pct, 50.0);

        let latency = series.find("latency", Some(Host::GoogleDns)).unwrap();
        assert_eq!(latency.points.len(), 2);
        assert_eq!(latency.points[1].value, None);
        let availability = series.find("availability", Some(Host::GoogleDns)).unwrap();
        assert_eq!(availability.points[0].value, Some(1.0));
        assert_eq!(series.find("cpu_temp", None).unwrap().points.len(), 2);
    }

    #[test]
    fn test_system_only_window_still_reports() {
        let system = vec![system("2024-01-01 08:00:00", None, 10.0)];
        let (summary, _) = assemble(window(), ts("2024-01-02 10:00:00"), &[], &system).unwrap();
        assert_eq!(summary.uptime_pct, 0.0);
        assert_eq!(summary.network.latency, None);
        assert!(summary.network_by_host.is_empty());
        assert_eq!(summary.system.cpu_temp, None);
        assert_eq!(summary.system_samples, 1);
    }

    #[test]
    fn test_no_data_skips_render_and_purge() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("network_report_stale.json");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(48 * 3600)).unwrap();

        let store = Arc::new(Store::open_in_memory().unwrap());
        let renderer = Arc::new(RecordingRenderer::new(dir.path()));
        let purger = Arc::new(Purger::new(dir.path(), Duration::from_secs(24 * 3600)));
        let service = ReportService::new(store, renderer.clone(), purger);

        let outcome = service.generate_at(ts("2024-01-02 10:00:00"), "yesterday", None).unwrap();
        assert_eq!(outcome, ReportOutcome::NoData);
        assert_eq!(renderer.calls(), 0);
        assert!(stale.exists());
    }

    #[test]
    fn test_generated_report_renders_then_purges() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("network_report_stale.json");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(48 * 3600)).unwrap();

        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .append_network(&NetworkSample::up(ts("2024-01-01 12:00:00"), Host::GoogleDns, 9.0, 1.0, 0.0))
            .unwrap();
        // Outside the window
        store
            .append_network(&NetworkSample::down(ts("2024-01-02 00:00:00"), Host::GoogleDns))
            .unwrap();

        let renderer = Arc::new(RecordingRenderer::new(dir.path()));
        let purger = Arc::new(Purger::new(dir.path(), Duration::from_secs(24 * 3600)));
        let service = ReportService::new(store, renderer.clone(), purger);

        let outcome = service.generate_at(ts("2024-01-02 10:00:00"), "yesterday", None).unwrap();
        assert!(matches!(outcome, ReportOutcome::Generated(_)));
        assert_eq!(renderer.calls(), 1);
        assert_eq!(renderer.last_summary().unwrap().uptime_pct, 100.0);
        assert!(!stale.exists());
    }

    #[test]
    fn test_invalid_window_fails_before_store_access() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let renderer = Arc::new(RecordingRenderer::new(dir.path()));
        let purger = Arc::new(Purger::new(dir.path(), Duration::from_secs(3600)));
        let service = ReportService::new(store, renderer, purger);

        assert!(matches!(
            service.generate_at(ts("2024-01-02 10:00:00"), "custom", None),
            Err(ReportError::Window(WindowError::MissingDate))
        ));
        assert!(matches!(
            service.generate("fortnight", None),
            Err(ReportError::Window(WindowError::UnknownKind(_)))
        ));
    }

    #[test]
    fn test_render_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.append_system(&system("2024-01-01 12:00:00", None, 5.0)).unwrap();
        let renderer = Arc::new(RecordingRenderer::failing(dir.path()));
        let purger = Arc::new(Purger::new(dir.path(), Duration::from_secs(3600)));
        let service = ReportService::new(store, renderer, purger);

        let result = service.generate_for_date(ts("2024-01-02 10:00:00"), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(matches!(result, Err(ReportError::Render(_))));
    }
}
