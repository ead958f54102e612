//! JSON report artifacts
//!
//! Writes the summary and series of one report as a single JSON document
//! named after the window start. Chart and PDF rendering consume this file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::report::{ReportRenderer, ReportSeries, ReportSummary};

#[derive(Serialize)]
struct ReportDocument<'a> {
    summary: &'a ReportSummary,
    series: &'a ReportSeries,
}

pub struct JsonRenderer {
    dir: PathBuf,
}

impl JsonRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, summary: &ReportSummary) -> PathBuf {
        self.dir.join(format!(
            "network_report_{}.json",
            summary.window.start.format("%Y%m%d_%H%M%S")
        ))
    }
}

impl ReportRenderer for JsonRenderer {
    fn render(&self, summary: &ReportSummary, series: &ReportSeries) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;

        let path = self.artifact_path(summary);
        let body = serde_json::to_vec_pretty(&ReportDocument { summary, series })
            .context("Failed to serialize report")?;

        // Readers never observe a half-written artifact
        let staging = staging_path(&path);
        std::fs::write(&staging, body).with_context(|| format!("Failed to write {}", staging.display()))?;
        std::fs::rename(&staging, &path).with_context(|| format!("Failed to publish {}", path.display()))?;

        debug!("Wrote report artifact {}", path.display());
        Ok(path)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
