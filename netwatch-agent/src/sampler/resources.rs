//! Local resource readings
//!
//! Provides the host health values the system sampler persists:
//! - CPU temperature (thermal zone file, then sysinfo sensors)
//! - CPU usage
//! - Memory usage and totals
//! - Storage usage of one mount point

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Components, Disks, System};
use tokio::sync::Mutex;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

const CPU_SAMPLE_GAP: Duration = Duration::from_millis(200);

/// Sensor labels that identify the CPU package on common platforms
const CPU_SENSOR_HINTS: [&str; 5] = ["package", "cpu", "core", "k10temp", "coretemp"];

/// One resource snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReading {
    pub cpu_temp: Option<f64>,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub storage_usage: f64,
    pub ram_used_mb: f64,
    pub ram_total_mb: f64,
    pub storage_used_gb: f64,
    pub storage_total_gb: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Total memory reported as zero")]
    NoMemory,
    #[error("No mounted filesystem covers {0}")]
    DiskNotFound(PathBuf),
}

#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read_resources(&self) -> Result<ResourceReading, ResourceError>;
}

/// sysinfo-backed reader; concurrent reads are serialized so each CPU
/// measurement spans its own refresh pair
pub struct SysinfoReader {
    system: Mutex<System>,
    thermal_zone: Option<PathBuf>,
    disk_mount: PathBuf,
}

impl SysinfoReader {
    pub fn new(thermal_zone: Option<PathBuf>, disk_mount: PathBuf) -> Self {
        Self {
            system: Mutex::new(System::new()),
            thermal_zone,
            disk_mount,
        }
    }

    fn read_temperature(&self) -> Option<f64> {
        if let Some(path) = &self.thermal_zone {
            match std::fs::read_to_string(path) {
                Ok(raw) => {
                    if let Some(celsius) = parse_millidegrees(&raw) {
                        return Some(celsius);
                    }
                    debug!("Thermal zone {} held unparsable value {:?}", path.display(), raw.trim());
                }
                Err(e) => debug!("Thermal zone {} unreadable: {}", path.display(), e),
            }
        }

        let components = Components::new_with_refreshed_list();
        let sensors: Vec<(String, f32)> = components
            .list()
            .iter()
            .map(|c| (c.label().to_string(), c.temperature()))
            .collect();
        pick_cpu_sensor(&sensors)
    }

    fn read_storage(&self) -> Result<(f64, f64, f64), ResourceError> {
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, u64, u64)> = disks
            .list()
            .iter()
            .map(|d| (d.mount_point().to_path_buf(), d.total_space(), d.available_space()))
            .collect();

        let (total, available) = pick_disk(&mounts, &self.disk_mount)
            .ok_or_else(|| ResourceError::DiskNotFound(self.disk_mount.clone()))?;
        let used = total.saturating_sub(available);
        Ok((
            percent(used, total),
            used as f64 / BYTES_PER_GB,
            total as f64 / BYTES_PER_GB,
        ))
    }
}

#[async_trait]
impl ResourceReader for SysinfoReader {
    async fn read_resources(&self) -> Result<ResourceReading, ResourceError> {
        debug!("Collecting resource readings...");

        // CPU usage is a delta between two refreshes
        let (cpu_usage, ram_used, ram_total) = {
            let mut sys = self.system.lock().await;
            sys.refresh_cpu_usage();
            tokio::time::sleep(CPU_SAMPLE_GAP).await;
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());
            (sys.global_cpu_info().cpu_usage() as f64, used, total)
        };

        if ram_total == 0 {
            return Err(ResourceError::NoMemory);
        }

        let (storage_usage, storage_used_gb, storage_total_gb) = self.read_storage()?;

        Ok(ResourceReading {
            cpu_temp: self.read_temperature(),
            cpu_usage,
            ram_usage: percent(ram_used, ram_total),
            storage_usage,
            ram_used_mb: ram_used as f64 / BYTES_PER_MB,
            ram_total_mb: ram_total as f64 / BYTES_PER_MB,
            storage_used_gb,
            storage_total_gb,
        })
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Thermal zone files hold millidegrees Celsius
fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().map(|milli| milli / 1000.0)
}

fn pick_cpu_sensor(sensors: &[(String, f32)]) -> Option<f64> {
    sensors
        .iter()
        .filter(|(_, temp)| temp.is_finite() && *temp > 0.0)
        .find(|(label, _)| {
            let label = label.to_lowercase();
            CPU_SENSOR_HINTS.iter().any(|hint| label.contains(hint))
        })
        .map(|(_, temp)| *temp as f64)
}

/// The disk whose mount point is the longest prefix of `target`
fn pick_disk(mounts: &[(PathBuf, u64, u64)], target: &Path) -> Option<(u64, u64)> {
    mounts
        .iter()
        .filter(|(mount, _, _)| target.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.components().count())
        .map(|(_, total, available)| (*total, *available))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("45000\n"), Some(45.0));
        assert_eq!(parse_millidegrees("61250"), Some(61.25));
        assert_eq!(parse_millidegrees("n/a"), None);
    }

    #[test]
    fn test_percent_handles_zero_total() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(25, 100), 25.0);
    }

    #[test]
    fn test_pick_cpu_sensor_prefers_cpu_labels() {
        let sensors = vec![
            ("nvme Composite".to_string(), 38.0),
            ("coretemp Package id 0".to_string(), 52.5),
        ];
        assert_eq!(pick_cpu_sensor(&sensors), Some(52.5));

        let unrelated = vec![("acpitz".to_string(), 27.8)];
        assert_eq!(pick_cpu_sensor(&unrelated), None);
        assert_eq!(pick_cpu_sensor(&[]), None);
    }

    #[test]
    fn test_pick_disk_uses_longest_mount_prefix() {
        let mounts = vec![
            (PathBuf::from("/"), 100, 40),
            (PathBuf::from("/home"), 500, 100),
            (PathBuf::from("/boot/efi"), 1, 1),
        ];
        assert_eq!(pick_disk(&mounts, Path::new("/")), Some((100, 40)));
        assert_eq!(pick_disk(&mounts, Path::new("/home/user")), Some((500, 100)));
        assert_eq!(pick_disk(&mounts[1..], Path::new("/var")), None);
    }

    #[tokio::test]
    async fn test_thermal_zone_file_is_read_first() {
        let dir = tempfile::tempdir().unwrap();
        let zone = dir.path().join("temp");
        std::fs::write(&zone, "48500\n").unwrap();

        let reader = SysinfoReader::new(Some(zone), PathBuf::from("/"));
        assert_eq!(reader.read_temperature(), Some(48.5));
    }

    #[tokio::test]
    async fn test_concurrent_reads_do_not_share_a_cpu_window() {
        let reader = SysinfoReader::new(None, PathBuf::from("/"));
        let start = std::time::Instant::now();

        // Outcomes depend on the host; only the timing matters here
        let _ = futures::future::join(reader.read_resources(), reader.read_resources()).await;

        assert!(start.elapsed() >= CPU_SAMPLE_GAP * 2);
    }
}
