//! Report artifact retention
//!
//! Deletes regular files in the report directory whose last-modified time is
//! older than the retention age. Subdirectories are left alone. A failed
//! deletion is logged and the scan moves on.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Purger {
    dir: PathBuf,
    retention: Duration,
}

impl Purger {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn purge(&self) -> PurgeSummary {
        self.purge_at(SystemTime::now())
    }

    pub fn purge_at(&self, now: SystemTime) -> PurgeSummary {
        let mut summary = PurgeSummary::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Report directory {} does not exist yet", self.dir.display());
                return summary;
            }
            Err(e) => {
                warn!("Failed to list report directory {}: {}", self.dir.display(), e);
                return summary;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let modified = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta.modified(),
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };
            summary.scanned += 1;

            let age = match modified {
                // Files stamped in the future have age zero
                Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    continue;
                }
            };
            if age <= self.retention {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Purged {} (age {}s)", path.display(), age.as_secs());
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to purge {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }

        if summary.deleted > 0 || summary.failed > 0 {
            info!(
                "Report purge in {}: {} scanned, {} deleted, {} failed",
                self.dir.display(),
                summary.scanned,
                summary.deleted,
                summary.failed
            );
        }
        summary
    }
}
