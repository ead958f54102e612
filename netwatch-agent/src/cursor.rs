//! Persisted daily-report cursor
//!
//! Holds the last calendar date the daily report was emitted for, as a small
//! JSON document. A bare `YYYY-MM-DD` file is also accepted when loading.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::window::parse_date;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("Cursor IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt cursor file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_report_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ReportCursor {
    path: PathBuf,
}

impl ReportCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last emitted date, `None` before the first emission
    pub async fn load(&self) -> Result<Option<NaiveDate>, CursorError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No report cursor at {}, starting fresh", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(CursorError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if let Ok(file) = serde_json::from_str::<CursorFile>(trimmed) {
            return Ok(Some(file.last_report_date));
        }
        parse_date(trimmed).map(Some).map_err(|e| CursorError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub async fn save(&self, date: NaiveDate) -> Result<(), CursorError> {
        let io_err = |source| CursorError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let content = serde_json::to_string_pretty(&CursorFile { last_report_date: date }).map_err(|e| {
            CursorError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        tokio::fs::write(&self.path, content).await.map_err(io_err)?;
        debug!("Report cursor advanced to {}", date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_cursor_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = ReportCursor::new(dir.path().join("cursor.json"));
        assert_eq!(cursor.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_survives_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("cursor.json");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        ReportCursor::new(&path).save(date).await.unwrap();
        assert_eq!(ReportCursor::new(&path).load().await.unwrap(), Some(date));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"last_report_date\": \"2024-01-02\""));
    }

    #[tokio::test]
    async fn test_bare_date_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".last_report_date");
        std::fs::write(&path, "2023-12-31\n").unwrap();

        let loaded = ReportCursor::new(&path).load().await.unwrap();
        assert_eq!(loaded, NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        std::fs::write(&path, "{\"last_report_date\": 7}").unwrap();

        assert!(matches!(
            ReportCursor::new(&path).load().await,
            Err(CursorError::Corrupt { .. })
        ));
    }
}
