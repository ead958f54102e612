//! Downtime cause classification
//!
//! Network rows are pivoted into one bucket per timestamp holding a status
//! per host. A host with no row in a bucket counts as DOWN.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::model::{Host, LinkStatus, NetworkSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketClass {
    /// Every host, gateway included, unreachable
    NoElectricity,
    /// Gateway reachable, both DNS hosts unreachable
    NoInternet,
    Nominal,
}

pub fn classify_bucket(statuses: &HashMap<Host, LinkStatus>) -> BucketClass {
    let is_down = |host: Host| !statuses.get(&host).is_some_and(|s| s.is_up());
    let dns_down = is_down(Host::GoogleDns) && is_down(Host::CloudflareDns);

    if dns_down && is_down(Host::LocalGateway) {
        BucketClass::NoElectricity
    } else if dns_down {
        BucketClass::NoInternet
    } else {
        BucketClass::Nominal
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DowntimeBreakdown {
    pub no_electricity: usize,
    pub no_internet: usize,
    pub nominal: usize,
    pub total: usize,
}

impl DowntimeBreakdown {
    fn pct(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    pub fn no_electricity_pct(&self) -> f64 {
        self.pct(self.no_electricity)
    }

    pub fn no_internet_pct(&self) -> f64 {
        self.pct(self.no_internet)
    }

    pub fn nominal_pct(&self) -> f64 {
        self.pct(self.nominal)
    }
}

pub fn classify(samples: &[NetworkSample]) -> DowntimeBreakdown {
    let mut buckets: BTreeMap<NaiveDateTime, HashMap<Host, LinkStatus>> = BTreeMap::new();
    for sample in samples {
        // A repeated host within one bucket keeps its last row
        buckets.entry(sample.timestamp).or_default().insert(sample.host, sample.status);
    }

    let mut breakdown = DowntimeBreakdown {
        total: buckets.len(),
        ..Default::default()
    };
    for statuses in buckets.values() {
        match classify_bucket(statuses) {
            BucketClass::NoElectricity => breakdown.no_electricity += 1,
            BucketClass::NoInternet => breakdown.no_internet += 1,
            BucketClass::Nominal => breakdown.nominal += 1,
        }
    }
    breakdown
}
