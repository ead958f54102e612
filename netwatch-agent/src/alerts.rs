//! Threshold evaluation and the alert queue
//!
//! Every fresh system sample is compared against per-metric warning/critical
//! thresholds. Warning crossings are only logged; critical crossings are
//! logged at error level and queued until the front-end drains them.

use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::model::{now_local, timestamp_serde, SystemSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CpuTemp,
    RamUsage,
    StorageUsage,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::CpuTemp, Metric::RamUsage, Metric::StorageUsage];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::CpuTemp => "cpu_temp",
            Metric::RamUsage => "ram_usage",
            Metric::StorageUsage => "storage_usage",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::CpuTemp => "CPU Temperature",
            Metric::RamUsage => "RAM Usage",
            Metric::StorageUsage => "Storage Usage",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::CpuTemp => "°C",
            Metric::RamUsage | Metric::StorageUsage => "%",
        }
    }

    fn value_of(&self, sample: &SystemSample) -> Option<f64> {
        match self {
            Metric::CpuTemp => sample.cpu_temp,
            Metric::RamUsage => Some(sample.ram_usage),
            Metric::StorageUsage => Some(sample.storage_usage),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key() == s)
            .ok_or_else(|| ThresholdError::UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Warning => "warning",
            Level::Critical => "critical",
        }
    }
}

impl FromStr for Level {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(Level::Warning),
            "critical" => Ok(Level::Critical),
            other => Err(ThresholdError::UnknownLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    #[error("Unknown threshold level: {0}")]
    UnknownLevel(String),
    #[error("Invalid threshold value: {0:?}")]
    InvalidValue(String),
    #[error("{metric} warning threshold {warning} exceeds critical threshold {critical}")]
    Inverted { metric: Metric, warning: f64, critical: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// Highest level reached by `value`, if any
    pub fn level_for(&self, value: f64) -> Option<Level> {
        if value >= self.critical {
            Some(Level::Critical)
        } else if value >= self.warning {
            Some(Level::Warning)
        } else {
            None
        }
    }

    fn with(&self, level: Level, value: f64) -> Self {
        match level {
            Level::Warning => Self { warning: value, ..*self },
            Level::Critical => Self { critical: value, ..*self },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub cpu_temp: ThresholdPair,
    pub ram_usage: ThresholdPair,
    pub storage_usage: ThresholdPair,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_temp: ThresholdPair::new(60.0, 65.0),
            ram_usage: ThresholdPair::new(70.0, 80.0),
            storage_usage: ThresholdPair::new(70.0, 80.0),
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self, metric: Metric) -> ThresholdPair {
        match metric {
            Metric::CpuTemp => self.cpu_temp,
            Metric::RamUsage => self.ram_usage,
            Metric::StorageUsage => self.storage_usage,
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut ThresholdPair {
        match metric {
            Metric::CpuTemp => &mut self.cpu_temp,
            Metric::RamUsage => &mut self.ram_usage,
            Metric::StorageUsage => &mut self.storage_usage,
        }
    }

    /// Every pair must be finite and keep warning ≤ critical
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for metric in Metric::ALL {
            let pair = self.get(metric);
            if !pair.warning.is_finite() || !pair.critical.is_finite() {
                return Err(ThresholdError::InvalidValue(format!("{:?}", pair)));
            }
            if pair.warning > pair.critical {
                return Err(ThresholdError::Inverted {
                    metric,
                    warning: pair.warning,
                    critical: pair.critical,
                });
            }
        }
        Ok(())
    }
}

/// A queued critical crossing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub message: String,
    #[serde(with = "timestamp_serde")]
    pub emitted_at: NaiveDateTime,
    pub metric: Metric,
    pub value: f64,
}

/// Unbounded in-process queue, drained atomically
#[derive(Debug, Default)]
pub struct AlertQueue {
    pending: Mutex<Vec<Alert>>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, alert: Alert) {
        self.pending.lock().push(alert);
    }

    /// Returns everything queued so far, oldest first, and leaves the queue empty
    pub fn drain_all(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One threshold crossing found by [`ThresholdEvaluator::evaluate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub metric: Metric,
    pub level: Level,
    pub value: f64,
    pub threshold: f64,
}

impl Crossing {
    pub fn message(&self) -> String {
        format!(
            "{}: {} {:.1} {} (Threshold: {} {})",
            self.level.as_str().to_uppercase(),
            self.metric.label(),
            self.value,
            self.metric.unit(),
            self.threshold,
            self.metric.unit()
        )
    }
}

pub struct ThresholdEvaluator {
    config: RwLock<ThresholdConfig>,
    queue: Arc<AlertQueue>,
}

impl ThresholdEvaluator {
    pub fn new(config: ThresholdConfig, queue: Arc<AlertQueue>) -> Self {
        Self {
            config: RwLock::new(config),
            queue,
        }
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.config.read().clone()
    }

    pub fn queue(&self) -> &Arc<AlertQueue> {
        &self.queue
    }

    /// Validated threshold update; on any error the configuration is untouched
    pub fn set_threshold(&self, metric: &str, level: &str, value: &str) -> Result<ThresholdPair, ThresholdError> {
        let result = self.try_set(metric, level, value);
        match &result {
            Ok(pair) => info!(
                "Threshold {}.{} set to {} (warning={}, critical={})",
                metric, level, value, pair.warning, pair.critical
            ),
            Err(e) => warn!("Rejected threshold update {}.{}={:?}: {}", metric, level, value, e),
        }
        result
    }

    fn try_set(&self, metric: &str, level: &str, value: &str) -> Result<ThresholdPair, ThresholdError> {
        let metric: Metric = metric.parse()?;
        let level: Level = level.parse()?;
        let value = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ThresholdError::InvalidValue(value.to_string()))?;

        let mut config = self.config.write();
        let updated = config.get(metric).with(level, value);
        if updated.warning > updated.critical {
            return Err(ThresholdError::Inverted {
                metric,
                warning: updated.warning,
                critical: updated.critical,
            });
        }
        *config.slot_mut(metric) = updated;
        Ok(updated)
    }

    /// Compare a fresh sample against the current thresholds and queue critical crossings
    pub fn evaluate(&self, sample: &SystemSample) -> Vec<Crossing> {
        let config = self.thresholds();
        let mut crossings = Vec::new();

        for metric in Metric::ALL {
            let Some(value) = metric.value_of(sample) else {
                continue;
            };
            let pair = config.get(metric);
            let Some(level) = pair.level_for(value) else {
                continue;
            };
            let threshold = match level {
                Level::Warning => pair.warning,
                Level::Critical => pair.critical,
            };
            let crossing = Crossing {
                metric,
                level,
                value,
                threshold,
            };
            let message = crossing.message();

            match level {
                Level::Critical => {
                    error!(severity = "critical", metric = metric.key(), value, "{}", message);
                    self.queue.enqueue(Alert {
                        message,
                        emitted_at: now_local(),
                        metric,
                        value,
                    });
                }
                Level::Warning => {
                    warn!(severity = "warning", metric = metric.key(), value, "{}", message);
                }
            }
            crossings.push(crossing);
        }

        crossings
    }

    pub fn drain_alerts(&self) -> Vec<Alert> {
        self.queue.drain_all()
    }
}
