//! NetWatch - network reachability and host health monitoring
//!
//! Samplers write two time series into an append-only store; fresh system
//! samples are checked against thresholds and critical crossings queue
//! alerts. Reports aggregate a time window into uptime, averages and
//! downtime causes, and a daily scheduler emits yesterday's report once per
//! calendar day.

pub mod alerts;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod delivery;
pub mod http;
pub mod ipinfo;
pub mod model;
pub mod monitor;
pub mod purge;
pub mod render;
pub mod report;
pub mod sampler;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod window;

#[cfg(test)]
mod testkit;
