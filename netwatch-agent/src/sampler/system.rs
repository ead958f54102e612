//! Host resource sampler

use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::resources::ResourceReader;
use super::SamplerError;
use crate::alerts::ThresholdEvaluator;
use crate::model::{now_local, SystemSample};
use crate::store::{Store, StoreError};

pub struct SystemSampler {
    store: Arc<Store>,
    reader: Arc<dyn ResourceReader>,
    evaluator: Arc<ThresholdEvaluator>,
}

impl SystemSampler {
    pub fn new(store: Arc<Store>, reader: Arc<dyn ResourceReader>, evaluator: Arc<ThresholdEvaluator>) -> Self {
        Self {
            store,
            reader,
            evaluator,
        }
    }

    /// Read, persist, then evaluate thresholds on the fresh sample
    pub async fn sample_once_at(&self, timestamp: NaiveDateTime) -> Result<SystemSample, SamplerError> {
        let reading = self.reader.read_resources().await?;
        let sample = SystemSample {
            timestamp,
            cpu_temp: reading.cpu_temp,
            cpu_usage: reading.cpu_usage,
            ram_usage: reading.ram_usage,
            storage_usage: reading.storage_usage,
        };

        let store = self.store.clone();
        let row = sample.clone();
        tokio::task::spawn_blocking(move || store.append_system(&row))
            .await
            .map_err(StoreError::from)??;
        debug!(
            "System sample: temp={:?} cpu={:.1}% ram={:.1}% storage={:.1}%",
            sample.cpu_temp, sample.cpu_usage, sample.ram_usage, sample.storage_usage
        );

        self.evaluator.evaluate(&sample);
        Ok(sample)
    }

    pub async fn sample_once(&self) -> Result<SystemSample, SamplerError> {
        self.sample_once_at(now_local()).await
    }

    pub async fn run(self: Arc<Self>, period: Duration) {
        info!("System sampler started (every {:?})", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sample_once().await {
                error!("System sampling tick failed: {}", e);
            }
        }
    }
}
