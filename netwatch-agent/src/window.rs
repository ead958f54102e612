//! Report window resolution
//!
//! Maps a window name (plus a date for `custom`) to a half-open
//! `[start, end)` interval relative to a given `now`.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::timestamp_serde;

/// Accepted layout for custom report dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    LastHour,
    Last24Hours,
    Today,
    Yesterday,
    Custom,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::LastHour => "last_hour",
            WindowKind::Last24Hours => "last_24_hours",
            WindowKind::Today => "today",
            WindowKind::Yesterday => "yesterday",
            WindowKind::Custom => "custom",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowKind {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_hour" => Ok(WindowKind::LastHour),
            "last_24_hours" => Ok(WindowKind::Last24Hours),
            "today" => Ok(WindowKind::Today),
            "yesterday" => Ok(WindowKind::Yesterday),
            "custom" => Ok(WindowKind::Custom),
            other => Err(WindowError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Unknown report window: {0}")]
    UnknownKind(String),
    #[error("Custom report window requires a date (YYYY-MM-DD)")]
    MissingDate,
    #[error("Invalid report date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// A resolved `[start, end)` interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    #[serde(with = "timestamp_serde")]
    pub start: NaiveDateTime,
    #[serde(with = "timestamp_serde")]
    pub end: NaiveDateTime,
    pub kind: WindowKind,
}

impl ReportWindow {
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.start <= *ts && *ts < self.end
    }
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, WindowError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| WindowError::InvalidDate(raw.to_string()))
}

/// Resolve a window from its string name, as received from callers
pub fn resolve_named(now: NaiveDateTime, kind: &str, date: Option<&str>) -> Result<ReportWindow, WindowError> {
    let kind: WindowKind = kind.parse()?;
    let date = match (kind, date) {
        (WindowKind::Custom, Some(raw)) => Some(parse_date(raw)?),
        (WindowKind::Custom, None) => return Err(WindowError::MissingDate),
        _ => None,
    };
    resolve(now, kind, date)
}

pub fn resolve(now: NaiveDateTime, kind: WindowKind, date: Option<NaiveDate>) -> Result<ReportWindow, WindowError> {
    let today = midnight(now.date());
    let (start, end) = match kind {
        WindowKind::LastHour => (now - Duration::hours(1), now),
        WindowKind::Last24Hours => (now - Duration::hours(24), now),
        WindowKind::Today => (today, now),
        WindowKind::Yesterday => (today - Duration::hours(24), today),
        WindowKind::Custom => {
            let start = midnight(date.ok_or(WindowError::MissingDate)?);
            (start, start + Duration::hours(24))
        }
    };
    Ok(ReportWindow { start, end, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_yesterday() {
        let window = resolve(ts("2024-01-02 10:00:00"), WindowKind::Yesterday, None).unwrap();
        assert_eq!(window.start, ts("2024-01-01 00:00:00"));
        assert_eq!(window.end, ts("2024-01-02 00:00:00"));
        assert!(window.contains(&ts("2024-01-01 23:59:59")));
        assert!(!window.contains(&ts("2024-01-02 00:00:00")));
    }

    #[test]
    fn test_relative_windows() {
        let now = ts("2024-03-10 00:30:00");

        let hour = resolve(now, WindowKind::LastHour, None).unwrap();
        assert_eq!((hour.start, hour.end), (ts("2024-03-09 23:30:00"), now));

        let day = resolve(now, WindowKind::Last24Hours, None).unwrap();
        assert_eq!(day.start, ts("2024-03-09 00:30:00"));

        let today = resolve(now, WindowKind::Today, None).unwrap();
        assert_eq!((today.start, today.end), (ts("2024-03-10 00:00:00"), now));
    }

    #[test]
    fn test_custom_date() {
        let window = resolve_named(ts("2024-03-10 12:00:00"), "custom", Some("2024-02-29")).unwrap();
        assert_eq!(window.kind, WindowKind::Custom);
        assert_eq!(window.start, ts("2024-02-29 00:00:00"));
        assert_eq!(window.end, ts("2024-03-01 00:00:00"));
    }

    #[test]
    fn test_invalid_requests_fail_validation() {
        let now = ts("2024-03-10 12:00:00");
        assert_eq!(
            resolve_named(now, "last_week", None),
            Err(WindowError::UnknownKind("last_week".to_string()))
        );
        assert_eq!(resolve_named(now, "custom", None), Err(WindowError::MissingDate));
        assert_eq!(
            resolve_named(now, "custom", Some("2024-02-30")),
            Err(WindowError::InvalidDate("2024-02-30".to_string()))
        );
        assert_eq!(resolve(now, WindowKind::Custom, None), Err(WindowError::MissingDate));
    }

    #[test]
    fn test_non_custom_kinds_ignore_date() {
        let now = ts("2024-03-10 12:00:00");
        let window = resolve_named(now, "today", Some("not-a-date")).unwrap();
        assert_eq!(window.start, ts("2024-03-10 00:00:00"));
    }
}
