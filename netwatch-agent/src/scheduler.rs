//! Daily report scheduler
//!
//! Polls on a fixed period. Whenever the persisted cursor differs from the
//! current date, it generates the report for yesterday, sends it to every
//! recipient, broadcasts a notice, purges old artifacts and advances the
//! cursor. A failed generation leaves the cursor alone so the next poll
//! retries. Each broadcast is bounded by a delivery timeout, and the last
//! emitted date is also kept in memory so an unwritable cursor cannot cause
//! repeat emissions within the same day.

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cursor::ReportCursor;
use crate::delivery::{Delivery, DeliveryChannel, DeliveryReport};
use crate::model::now_local;
use crate::report::{ReportOutcome, ReportService};

pub const REPORT_CAPTION: &str = "📊 Yesterday's Report";
pub const REPORT_SENT_NOTICE: &str = "📈 Report sent automatically.";
pub const NO_DATA_NOTICE: &str = "❌ No data for yesterday.";

/// Upper bound for one broadcast to every recipient
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cursor already names today
    UpToDate,
    Emitted(ReportOutcome),
    Failed,
}

pub struct DailyScheduler {
    reports: Arc<ReportService>,
    cursor: ReportCursor,
    channel: Arc<dyn DeliveryChannel>,
    recipients: Vec<String>,
    delivery_timeout: Duration,
    last_emitted: Mutex<Option<NaiveDate>>,
}

impl DailyScheduler {
    pub fn new(
        reports: Arc<ReportService>,
        cursor: ReportCursor,
        channel: Arc<dyn DeliveryChannel>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            reports,
            cursor,
            channel,
            recipients,
            delivery_timeout: DELIVERY_TIMEOUT,
            last_emitted: Mutex::new(None),
        }
    }

    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    async fn broadcast(&self, delivery: &Delivery) -> DeliveryReport {
        match timeout(self.delivery_timeout, self.channel.deliver(&self.recipients, delivery)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    "Delivery to {} recipients timed out after {:?}",
                    self.recipients.len(),
                    self.delivery_timeout
                );
                DeliveryReport {
                    delivered: 0,
                    failed: self.recipients.len(),
                }
            }
        }
    }

    pub async fn tick_at(&self, now: NaiveDateTime) -> TickOutcome {
        let today = now.date();
        if *self.last_emitted.lock() == Some(today) {
            debug!("Daily report for {} already emitted by this process", today);
            return TickOutcome::UpToDate;
        }
        let last = match self.cursor.load().await {
            Ok(last) => last,
            Err(e) => {
                // An unreadable cursor counts as never emitted
                warn!("Report cursor unreadable, treating as empty: {}", e);
                None
            }
        };
        if last == Some(today) {
            debug!("Daily report for {} already emitted", today);
            return TickOutcome::UpToDate;
        }

        info!("Generating daily report (cursor: {:?}, today: {})", last, today);
        let reports = self.reports.clone();
        let generated = tokio::task::spawn_blocking(move || reports.generate_at(now, "yesterday", None)).await;
        let outcome = match generated {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Daily report generation failed: {}", e);
                return TickOutcome::Failed;
            }
            Err(e) => {
                error!("Daily report task panicked: {}", e);
                return TickOutcome::Failed;
            }
        };

        match &outcome {
            ReportOutcome::Generated(path) => {
                let artifact = Delivery::Artifact {
                    path: path.clone(),
                    caption: REPORT_CAPTION.to_string(),
                };
                let sent = self.broadcast(&artifact).await;
                self.broadcast(&Delivery::Message(REPORT_SENT_NOTICE.to_string())).await;
                info!(
                    "Daily report {} delivered to {}/{} recipients",
                    path.display(),
                    sent.delivered,
                    self.recipients.len()
                );
            }
            ReportOutcome::NoData => {
                self.broadcast(&Delivery::Message(NO_DATA_NOTICE.to_string())).await;
            }
        }

        let purger = self.reports.purger().clone();
        if let Err(e) = tokio::task::spawn_blocking(move || purger.purge()).await {
            error!("Report purge task panicked: {}", e);
        }

        *self.last_emitted.lock() = Some(today);
        if let Err(e) = self.cursor.save(today).await {
            error!("Failed to advance report cursor to {}: {}", today, e);
        }
        TickOutcome::Emitted(outcome)
    }

    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(now_local()).await
    }

    pub async fn run(self: Arc<Self>, period: Duration) {
        info!(
            "Daily report scheduler started (poll every {:?}, cursor {})",
            period,
            self.cursor.path().display()
        );
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
