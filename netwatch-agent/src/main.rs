//! NetWatch Agent - network and host health monitor
//!
//! Starts:
//! - the network sampler (reachability of DNS hosts and the gateway)
//! - the system sampler (temperature, CPU, RAM, storage + threshold alerts)
//! - the daily report scheduler
//! - the HTTP status API

use anyhow::{Context, Result};
use netwatch_agent::alerts::{AlertQueue, ThresholdEvaluator};
use netwatch_agent::config::MonitorConfig;
use netwatch_agent::cursor::ReportCursor;
use netwatch_agent::delivery::{DeliveryChannel, LogDelivery, MqttDelivery};
use netwatch_agent::http::{build_router, AppState};
use netwatch_agent::monitor::Monitor;
use netwatch_agent::purge::Purger;
use netwatch_agent::render::JsonRenderer;
use netwatch_agent::report::ReportService;
use netwatch_agent::sampler::{NetworkSampler, PingExecutor, SysinfoReader, SystemSampler};
use netwatch_agent::scheduler::DailyScheduler;
use netwatch_agent::store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netwatch_agent=info")))
        .init();

    info!("NetWatch Agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::load().await.context("Failed to load configuration")?;

    let store = Arc::new(
        Store::open(&config.storage.db_path)
            .with_context(|| format!("Failed to open store at {}", config.storage.db_path.display()))?,
    );

    let purger = Arc::new(Purger::new(&config.reports.dir, config.reports.retention()));
    let startup = purger.purge();
    info!("Startup purge: {} of {} artifacts removed", startup.deleted, startup.scanned);

    let queue = Arc::new(AlertQueue::new());
    let evaluator = Arc::new(ThresholdEvaluator::new(config.thresholds.clone(), queue));
    let reader = Arc::new(SysinfoReader::new(
        config.system.thermal_zone_path.clone(),
        config.system.disk_mount.clone(),
    ));
    let reports = Arc::new(ReportService::new(
        store.clone(),
        Arc::new(JsonRenderer::new(&config.reports.dir)),
        purger,
    ));

    let network = Arc::new(NetworkSampler::new(
        store.clone(),
        Arc::new(PingExecutor::new(config.network.probe_timeout())),
        config.network.targets(),
        config.network.probe_count,
    ));
    let system = Arc::new(SystemSampler::new(store.clone(), reader.clone(), evaluator.clone()));

    let channel: Arc<dyn DeliveryChannel> = match &config.delivery.mqtt {
        Some(mqtt) => Arc::new(MqttDelivery::connect(mqtt)),
        None => Arc::new(LogDelivery),
    };
    if config.delivery.recipients.is_empty() {
        warn!("No report recipients configured; daily reports will only be written to disk");
    }
    let scheduler = Arc::new(DailyScheduler::new(
        reports.clone(),
        ReportCursor::new(&config.storage.cursor_path),
        channel,
        config.delivery.recipients.clone(),
    ));

    let tasks = vec![
        tokio::spawn(network.run(config.network.interval())),
        tokio::spawn(system.run(config.system.interval())),
        tokio::spawn(scheduler.run(config.reports.scheduler_poll())),
    ];

    let api_key = MonitorConfig::api_key();
    if api_key.is_none() {
        warn!("NETWATCH_API_KEY not set - only /health will be reachable");
    }
    let monitor = Arc::new(Monitor::new(store, evaluator, reader, reports));
    let app = build_router(AppState {
        monitor,
        api_key: api_key.map(Arc::from),
    });

    let listener = TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("Failed to bind HTTP API on {}", config.http.bind))?;
    info!("HTTP API listening on {}", config.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down background tasks");
    for task in tasks {
        task.abort();
    }
    Ok(())
}
