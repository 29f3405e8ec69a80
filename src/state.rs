//! # Application State Management
//!
//! Shared state for the HTTP layer: the runtime-updatable configuration and
//! coarse service metrics. Everything call-scoped deliberately lives
//! elsewhere: each bridge session owns its queue and flags privately so
//! concurrent calls cannot leak state into one another; the only things
//! sessions touch here are monotonic counters.

use crate::config::AppConfig;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Shared application state handed to every handler and session actor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (updatable at runtime via the config API).
    pub config: Arc<RwLock<AppConfig>>,

    /// Service-level counters.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started.
    pub start_time: Instant,
}

/// Coarse service metrics across all calls and requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// HTTP requests processed since start.
    pub request_count: u64,

    /// HTTP errors since start.
    pub error_count: u64,

    /// Calls currently bridged (gauge).
    pub active_calls: u32,

    /// Calls accepted since start.
    pub total_calls: u64,

    /// Telephony → model frames forwarded since start.
    pub uplink_frames: u64,

    /// Model → telephony frames forwarded since start.
    pub downlink_frames: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Snapshot the current configuration (clone releases the lock fast).
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// A call was accepted: bump the gauge and the lifetime counter.
    pub fn call_started(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_calls += 1;
        metrics.total_calls += 1;
    }

    /// A call ended. Guarded against underflow so a double-close cannot
    /// wrap the gauge.
    pub fn call_ended(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_calls > 0 {
            metrics.active_calls -= 1;
        }
    }

    pub fn record_uplink_frame(&self) {
        self.metrics.write().unwrap().uplink_frames += 1;
    }

    pub fn record_downlink_frame(&self) {
        self.metrics.write().unwrap().downlink_frames += 1;
    }

    /// Consistent copy of the metrics for the health endpoints.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
